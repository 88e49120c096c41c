//! Session coordination.
//!
//! [`SessionCoordinator`] is one client's entry point to the protocol:
//! creating and joining sessions, recording votes, and subscribing to
//! snapshot pushes. Two clients in the same process are two coordinators
//! sharing one store and one notifier; the coordinator owns all session
//! state and local subscription bookkeeping, the client keeps only session
//! codes.
//!
//! Correctness under two concurrent writers is delegated entirely to the
//! store's `atomic_update`: votes and match appends are read-modify-write
//! transactions over the document, never unguarded read-then-writes from
//! client memory.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;

use crate::catalog::CatalogClient;
use crate::config::{EnrichmentConfig, ReelmatchConfig};
use crate::evaluator;
use crate::events::{dispatch, SessionEvent};
use crate::notifier::{ChangeNotifier, Subscription, SubscriptionGuard};
use crate::session::{
    generate_participant_id, CreateOutcome, ItemId, MatchRecord, ParticipantId, Session,
    SessionCode, SessionStore, MAX_PARTICIPANTS,
};
use crate::SessionError;

/// One client's coordinator over a shared session store.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use reelmatch::{ChangeNotifier, InMemorySessionStore, MockCatalogClient, SessionCoordinator};
///
/// let store = Arc::new(InMemorySessionStore::new());
/// let catalog = Arc::new(MockCatalogClient::new());
/// let notifier = Arc::new(ChangeNotifier::new());
///
/// let alice = SessionCoordinator::new(store.clone(), catalog.clone(), notifier.clone());
/// let bob = SessionCoordinator::new(store, catalog, notifier);
///
/// let code = alice.create_session().await?;
/// bob.join_session(code.as_str()).await?;
/// ```
pub struct SessionCoordinator<S, C> {
    store: Arc<S>,
    catalog: Arc<C>,
    notifier: Arc<ChangeNotifier>,
    config: ReelmatchConfig,
    participant_id: ParticipantId,
    subscriptions: Mutex<HashMap<SessionCode, Vec<SubscriptionGuard>>>,
}

impl<S, C> SessionCoordinator<S, C>
where
    S: SessionStore + 'static,
    C: CatalogClient + 'static,
{
    /// Creates a coordinator with a fresh anonymous participant id and
    /// default configuration.
    pub fn new(store: Arc<S>, catalog: Arc<C>, notifier: Arc<ChangeNotifier>) -> Self {
        Self::with_config(store, catalog, notifier, ReelmatchConfig::default())
    }

    /// Creates a coordinator with explicit configuration.
    pub fn with_config(
        store: Arc<S>,
        catalog: Arc<C>,
        notifier: Arc<ChangeNotifier>,
        config: ReelmatchConfig,
    ) -> Self {
        Self {
            store,
            catalog,
            notifier,
            config,
            participant_id: generate_participant_id(),
            subscriptions: Mutex::new(HashMap::new()),
        }
    }

    /// Overrides the generated participant id. Useful in tests that need
    /// deterministic ids.
    pub fn with_participant_id(mut self, participant_id: impl Into<ParticipantId>) -> Self {
        self.participant_id = participant_id.into();
        self
    }

    /// This client's anonymous participant token.
    pub fn participant_id(&self) -> &str {
        &self.participant_id
    }

    /// Creates a new session with this client as its only participant and
    /// returns its code.
    ///
    /// Codes are generated randomly and checked against the store; a
    /// collision regenerates, up to the configured attempt budget. Creation
    /// is atomic create-if-absent: a session is never partially written.
    pub async fn create_session(&self) -> Result<SessionCode, SessionError> {
        for _ in 0..self.config.codes.max_generation_attempts {
            let code = SessionCode::generate();
            let doc = Session::new(code.clone(), self.participant_id.clone());

            match self.store.create_if_absent(doc).await? {
                CreateOutcome::Created(committed) => {
                    self.notifier.publish(committed);
                    dispatch(SessionEvent::SessionCreated {
                        code: code.clone(),
                        created_by: self.participant_id.clone(),
                        at: Utc::now(),
                    })
                    .await;
                    return Ok(code);
                }
                CreateOutcome::AlreadyExists => continue,
            }
        }

        Err(SessionError::StoreUnavailable(
            "could not generate an unused session code".to_owned(),
        ))
    }

    /// Joins the session with the given code, case-insensitively.
    ///
    /// Fails with [`SessionError::NotFound`] when no active session has the
    /// code and with [`SessionError::SessionFull`] when two other
    /// participants are already present. Re-joining a session this client
    /// is already in is a no-op, not an error.
    pub async fn join_session(&self, code: &str) -> Result<SessionCode, SessionError> {
        let code = SessionCode::parse(code)?;
        let user_id = self.participant_id.clone();

        let mut newly_joined = false;
        let committed = self
            .store
            .atomic_update(&code, |session| {
                newly_joined = false;
                if !session.active {
                    return Err(SessionError::NotFound);
                }
                let mut next = session.clone();
                if next.is_member(&user_id) {
                    return Ok(next);
                }
                if next.users.len() >= MAX_PARTICIPANTS {
                    return Err(SessionError::SessionFull);
                }
                next.users.push(user_id.clone());
                newly_joined = true;
                Ok(next)
            })
            .await?;

        self.notifier.publish(committed);
        if newly_joined {
            dispatch(SessionEvent::ParticipantJoined {
                code: code.clone(),
                user_id,
                at: Utc::now(),
            })
            .await;
        }
        Ok(code)
    }

    /// Records this client's vote on one item.
    ///
    /// The vote is one atomic transaction over the document's vote sub-map;
    /// a later vote from the same participant overwrites the earlier one.
    /// When the committed snapshot completes a match, a match record is
    /// appended idempotently; a failed catalog fetch yields a placeholder
    /// record that is enriched in the background rather than a lost match.
    ///
    /// Exhausted conflict retries surface as
    /// [`SessionError::TransientWriteFailure`] so the caller can re-attempt;
    /// the vote is never silently dropped.
    pub async fn record_vote(
        &self,
        code: &str,
        item_id: ItemId,
        liked: bool,
    ) -> Result<(), SessionError> {
        let code = SessionCode::parse(code)?;
        let user_id = self.participant_id.clone();

        let committed = self
            .store
            .atomic_update(&code, |session| {
                if !session.active {
                    return Err(SessionError::NotFound);
                }
                let mut next = session.clone();
                next.record_vote(item_id, user_id.clone(), liked);
                Ok(next)
            })
            .await?;

        self.notifier
            .publish(committed.clone());
        dispatch(SessionEvent::VoteRecorded {
            code: code.clone(),
            item_id,
            user_id,
            liked,
            at: Utc::now(),
        })
        .await;

        if evaluator::completes_match(
            committed.doc.swipes.get(&item_id),
            &committed.doc.matches,
            item_id,
        ) {
            self.flag_match(&code, item_id).await?;
        }
        Ok(())
    }

    /// Purely local bookkeeping: cancels this client's subscriptions for
    /// the session. The store document is untouched; the other participant
    /// keeps the session.
    pub async fn leave_session(&self, code: &str) -> Result<(), SessionError> {
        let code = SessionCode::parse(code)?;

        let guards = self
            .subscriptions
            .lock()
            .map_err(|_| SessionError::StoreUnavailable("Lock poisoned".to_owned()))?
            .remove(&code);
        if let Some(guards) = guards {
            for guard in &guards {
                guard.cancel();
            }
        }

        dispatch(SessionEvent::SessionLeft {
            code,
            user_id: self.participant_id.clone(),
            at: Utc::now(),
        })
        .await;
        Ok(())
    }

    /// Subscribes to the session's snapshot stream.
    ///
    /// The first received snapshot is the baseline; clients detect new
    /// matches by diffing `matches` against it. The subscription is
    /// registered with this coordinator and cancelled by
    /// [`leave_session`](Self::leave_session).
    pub async fn subscribe(&self, code: &str) -> Result<Subscription, SessionError> {
        let code = SessionCode::parse(code)?;
        let current = self
            .store
            .get_versioned(&code)
            .await?
            .ok_or(SessionError::NotFound)?;
        if !current.doc.active {
            return Err(SessionError::NotFound);
        }

        let subscription = self.notifier.subscribe(&code, current)?;
        self.subscriptions
            .lock()
            .map_err(|_| SessionError::StoreUnavailable("Lock poisoned".to_owned()))?
            .entry(code)
            .or_default()
            .push(subscription.guard());
        Ok(subscription)
    }

    /// Fetches metadata and appends the match record for `item_id`.
    ///
    /// The append is idempotent: when the other participant's vote already
    /// created the record, this commit is a no-op and no duplicate event
    /// fires.
    async fn flag_match(&self, code: &SessionCode, item_id: ItemId) -> Result<(), SessionError> {
        let record = match self.catalog.fetch_item(item_id).await {
            Ok(item) => MatchRecord::new(item_id, item.title, item.image_path, item.rating_score),
            Err(err) => {
                log::warn!(
                    target: "reelmatch::coordinator",
                    "catalog fetch for item {} failed ({}); recording placeholder match",
                    item_id,
                    err
                );
                MatchRecord::placeholder(item_id)
            }
        };
        let needs_enrichment = !record.is_enriched();

        let mut appended = false;
        let committed = self
            .store
            .atomic_update(code, |session| {
                let mut next = session.clone();
                appended = next.append_match(record.clone());
                Ok(next)
            })
            .await?;

        self.notifier.publish(committed);
        if appended {
            dispatch(SessionEvent::MatchFound {
                code: code.clone(),
                item_id,
                at: Utc::now(),
            })
            .await;
            if needs_enrichment {
                self.spawn_enrichment(code.clone(), item_id);
            }
        }
        Ok(())
    }

    fn spawn_enrichment(&self, code: SessionCode, item_id: ItemId) {
        let store = Arc::clone(&self.store);
        let catalog = Arc::clone(&self.catalog);
        let notifier = Arc::clone(&self.notifier);
        let config = self.config.enrichment.clone();
        tokio::spawn(async move {
            enrich_match(store, catalog, notifier, config, code, item_id).await;
        });
    }
}

/// Background enrichment of a placeholder match record.
///
/// Retries the catalog fetch with backoff and fills in the record's empty
/// metadata fields. The record itself is already committed; enrichment never
/// removes it and never rewrites fields another writer filled first.
async fn enrich_match<S, C>(
    store: Arc<S>,
    catalog: Arc<C>,
    notifier: Arc<ChangeNotifier>,
    config: EnrichmentConfig,
    code: SessionCode,
    item_id: ItemId,
) where
    S: SessionStore,
    C: CatalogClient,
{
    let mut last_error = String::new();

    for _ in 0..config.max_attempts {
        tokio::time::sleep(config.backoff).await;

        let item = match catalog.fetch_item(item_id).await {
            Ok(item) => item,
            Err(err) => {
                last_error = err.to_string();
                continue;
            }
        };

        let result = store
            .atomic_update(&code, |session| {
                let mut next = session.clone();
                if let Some(record) = next
                    .matches
                    .iter_mut()
                    .find(|m| m.item_id == item_id && !m.is_enriched())
                {
                    record.title = Some(item.title.clone());
                    record.image_path = item.image_path.clone();
                    record.rating_score = Some(item.rating_score);
                }
                Ok(next)
            })
            .await;

        match result {
            Ok(committed) => {
                notifier.publish(committed);
                dispatch(SessionEvent::MatchEnriched {
                    code,
                    item_id,
                    at: Utc::now(),
                })
                .await;
            }
            Err(err) => {
                log::warn!(
                    target: "reelmatch::coordinator",
                    "enrichment write for item {} in {} failed: {}",
                    item_id,
                    code,
                    err
                );
            }
        }
        return;
    }

    log::warn!(
        target: "reelmatch::coordinator",
        "enrichment for item {} in {} gave up after {} attempts: {}",
        item_id,
        code,
        config.max_attempts,
        last_error
    );
    dispatch(SessionEvent::EnrichmentFailed {
        code,
        item_id,
        reason: last_error,
        at: Utc::now(),
    })
    .await;
}
