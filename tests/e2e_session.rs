//! End-to-end tests for the two-party session protocol.
//!
//! Two coordinators sharing one in-memory store and one notifier model the
//! two clients.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use reelmatch::config::ReelmatchConfig;
use reelmatch::{
    ChangeNotifier, InMemorySessionStore, MockCatalogClient, SessionCoordinator, SessionError,
    SessionStore,
};

type Coordinator = SessionCoordinator<InMemorySessionStore, MockCatalogClient>;

struct Harness {
    store: Arc<InMemorySessionStore>,
    catalog: Arc<MockCatalogClient>,
    notifier: Arc<ChangeNotifier>,
}

impl Harness {
    fn new() -> Self {
        Self {
            store: Arc::new(InMemorySessionStore::new()),
            catalog: Arc::new(MockCatalogClient::new()),
            notifier: Arc::new(ChangeNotifier::new()),
        }
    }

    fn client(&self, id: &str) -> Coordinator {
        SessionCoordinator::with_config(
            Arc::clone(&self.store),
            Arc::clone(&self.catalog),
            Arc::clone(&self.notifier),
            ReelmatchConfig::development(),
        )
        .with_participant_id(id)
    }
}

#[tokio::test]
async fn test_full_couple_scenario() {
    let harness = Harness::new();
    harness.catalog.insert(550, "Fight Club", 8.4);

    let alice = harness.client("user_alice");
    let bob = harness.client("user_bob");

    // Alice creates; Bob joins with the lowercase form of the code.
    let code = alice.create_session().await.expect("create failed");
    let joined = bob
        .join_session(&code.as_str().to_lowercase())
        .await
        .expect("case-insensitive join failed");
    assert_eq!(joined, code);

    let doc = harness.store.get(&code).await.unwrap().unwrap();
    assert_eq!(doc.users, vec!["user_alice".to_owned(), "user_bob".to_owned()]);

    // Both like item 550: exactly one match record appears.
    alice.record_vote(code.as_str(), 550, true).await.unwrap();
    bob.record_vote(code.as_str(), 550, true).await.unwrap();

    let doc = harness.store.get(&code).await.unwrap().unwrap();
    assert_eq!(doc.matches.len(), 1);
    assert_eq!(doc.matches[0].item_id, 550);
    assert_eq!(doc.matches[0].title.as_deref(), Some("Fight Club"));
    assert_eq!(doc.matches[0].rating_score, Some(8.4));

    // Alice changing her mind does not erase the recorded match.
    alice.record_vote(code.as_str(), 550, false).await.unwrap();

    let doc = harness.store.get(&code).await.unwrap().unwrap();
    assert_eq!(doc.matches.len(), 1);
    assert_eq!(doc.matches[0].title.as_deref(), Some("Fight Club"));
    assert_eq!(doc.swipes[&550]["user_alice"], false);
}

#[tokio::test]
async fn test_third_client_gets_session_full() {
    let harness = Harness::new();
    let alice = harness.client("user_alice");
    let bob = harness.client("user_bob");
    let carol = harness.client("user_carol");

    let code = alice.create_session().await.unwrap();
    bob.join_session(code.as_str()).await.unwrap();

    assert_eq!(
        carol.join_session(code.as_str()).await,
        Err(SessionError::SessionFull)
    );

    // The full session is intact.
    let doc = harness.store.get(&code).await.unwrap().unwrap();
    assert_eq!(doc.users.len(), 2);
    assert!(!doc.is_member("user_carol"));
}

#[tokio::test]
async fn test_dislike_then_like_never_matches() {
    let harness = Harness::new();
    harness.catalog.insert(603, "The Matrix", 8.2);

    let alice = harness.client("user_alice");
    let bob = harness.client("user_bob");

    let code = alice.create_session().await.unwrap();
    bob.join_session(code.as_str()).await.unwrap();

    bob.record_vote(code.as_str(), 603, false).await.unwrap();
    alice.record_vote(code.as_str(), 603, true).await.unwrap();

    let doc = harness.store.get(&code).await.unwrap().unwrap();
    assert!(doc.matches.is_empty());
}

#[tokio::test]
async fn test_revote_leaves_single_vote() {
    let harness = Harness::new();
    let alice = harness.client("user_alice");

    let code = alice.create_session().await.unwrap();
    alice.record_vote(code.as_str(), 550, true).await.unwrap();
    alice.record_vote(code.as_str(), 550, false).await.unwrap();
    alice.record_vote(code.as_str(), 550, true).await.unwrap();

    let doc = harness.store.get(&code).await.unwrap().unwrap();
    let votes = doc.swipes.get(&550).unwrap();
    assert_eq!(votes.len(), 1);
    assert_eq!(votes.get("user_alice"), Some(&true));
}

#[tokio::test]
async fn test_vote_on_unknown_session() {
    let harness = Harness::new();
    let alice = harness.client("user_alice");

    assert_eq!(
        alice.record_vote("ZZZZZZ", 550, true).await,
        Err(SessionError::NotFound)
    );
}

#[tokio::test]
async fn test_codes_are_unique_among_active_sessions() {
    let harness = Harness::new();
    let alice = harness.client("user_alice");

    let mut codes = std::collections::HashSet::new();
    for _ in 0..32 {
        let code = alice.create_session().await.unwrap();
        assert!(codes.insert(code), "store accepted a duplicate code");
    }
    assert_eq!(harness.store.len(), 32);
}
