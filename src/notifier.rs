//! Snapshot push for session documents.
//!
//! Replaces callback-list notification with message passing: every session
//! code gets a broadcast channel the write path publishes committed
//! snapshots onto, and each subscriber reads from its own receiver. Delivery
//! is decoupled from the write path; a writer never blocks on a subscriber.
//!
//! Subscribers receive the current snapshot immediately (the baseline) and
//! then every subsequent change, in commit order per session code. Every
//! snapshot travels with its store revision, and each subscriber drops
//! anything at or below the revision it last saw, so a late publish of an
//! older commit can never be observed after a fresher baseline. "New match"
//! is a subscriber-side diff against the baseline; the notifier carries no
//! new-vs-old distinction.
//!
//! Channels are kept for the process lifetime. There is no session teardown
//! policy in the protocol, so none is invented here.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

use crate::session::{Committed, Session, SessionCode};
use crate::SessionError;

struct Channel {
    latest: Committed,
    tx: broadcast::Sender<Committed>,
}

/// Per-session-code snapshot fan-out.
///
/// One instance is shared (behind an `Arc`) by every coordinator operating
/// on the same store, so that one client's committed write reaches the
/// other client's subscriptions.
pub struct ChangeNotifier {
    channels: Mutex<HashMap<SessionCode, Channel>>,
    capacity: usize,
}

impl ChangeNotifier {
    /// Creates a notifier with the default per-subscriber buffer.
    pub fn new() -> Self {
        Self::with_capacity(crate::config::ReelmatchConfig::default().notifier_capacity)
    }

    /// Creates a notifier with an explicit per-subscriber buffer. A reader
    /// that falls more than `capacity` snapshots behind skips ahead to the
    /// newer ones.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Publishes a committed snapshot to every subscriber of its code.
    ///
    /// Stale and duplicate revisions are dropped, which keeps per-code
    /// delivery in commit order even when two writers race to publish.
    pub fn publish(&self, committed: Committed) {
        let mut channels = match self.channels.lock() {
            Ok(guard) => guard,
            Err(_) => {
                log::error!(target: "reelmatch::notifier", "channel registry lock poisoned");
                return;
            }
        };

        match channels.entry(committed.doc.code.clone()) {
            Entry::Occupied(mut entry) => {
                let channel = entry.get_mut();
                if committed.revision <= channel.latest.revision {
                    return;
                }
                channel.latest = committed.clone();
                // Err means no live receivers; the snapshot is retained as
                // the baseline for future subscribers.
                let _ = channel.tx.send(committed);
            }
            Entry::Vacant(entry) => {
                let (tx, _) = broadcast::channel(self.capacity);
                entry.insert(Channel {
                    latest: committed,
                    tx,
                });
            }
        }
    }

    /// Subscribes to a session code.
    ///
    /// `current` is the caller's fresh versioned read of the document and
    /// seeds the channel if this is the first interest in the code. The
    /// baseline is whichever of `current` and the notifier's last published
    /// snapshot carries the higher revision; the subscriber then never sees
    /// a commit at or below that revision, even if a slow writer publishes
    /// one late. Baseline selection and receiver registration happen under
    /// the same lock as [`publish`](Self::publish), so no committed change
    /// can fall between the baseline and the first delivery.
    pub fn subscribe(
        &self,
        code: &SessionCode,
        current: Committed,
    ) -> Result<Subscription, SessionError> {
        let mut channels = self
            .channels
            .lock()
            .map_err(|_| SessionError::StoreUnavailable("Lock poisoned".to_owned()))?;

        let channel = channels.entry(code.clone()).or_insert_with(|| {
            let (tx, _) = broadcast::channel(self.capacity);
            Channel {
                latest: current.clone(),
                tx,
            }
        });

        let baseline = if current.revision > channel.latest.revision {
            current
        } else {
            channel.latest.clone()
        };

        Ok(Subscription {
            baseline: Some(baseline),
            rx: channel.tx.subscribe(),
            last_revision: 0,
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

/// One subscriber's stream of session snapshots.
///
/// The first [`recv`](Subscription::recv) returns the baseline snapshot;
/// each later call returns the next committed change. `None` means the
/// subscription was cancelled.
pub struct Subscription {
    baseline: Option<Committed>,
    rx: broadcast::Receiver<Committed>,
    last_revision: u64,
    cancelled: Arc<AtomicBool>,
}

impl Subscription {
    /// Receives the next snapshot, or `None` once unsubscribed.
    pub async fn recv(&mut self) -> Option<Session> {
        loop {
            if self.cancelled.load(Ordering::Acquire) {
                self.baseline = None;
                return None;
            }
            if let Some(baseline) = self.baseline.take() {
                self.last_revision = baseline.revision;
                return Some(baseline.doc);
            }
            match self.rx.recv().await {
                Ok(committed) => {
                    if self.cancelled.load(Ordering::Acquire) {
                        return None;
                    }
                    // Commits at or below the baseline (or a previously
                    // delivered snapshot) are stale for this subscriber.
                    if committed.revision <= self.last_revision {
                        continue;
                    }
                    self.last_revision = committed.revision;
                    return Some(committed.doc);
                }
                // Fell behind; the skipped snapshots' effects are all
                // contained in the newer ones still queued.
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Stops delivery. Idempotent; after this returns, [`recv`] only
    /// returns `None`.
    pub fn unsubscribe(&mut self) {
        self.cancelled.store(true, Ordering::Release);
        self.baseline = None;
    }

    /// A handle that can cancel this subscription from elsewhere, e.g. the
    /// coordinator's `leave_session` bookkeeping.
    pub fn guard(&self) -> SubscriptionGuard {
        SubscriptionGuard {
            cancelled: Arc::clone(&self.cancelled),
        }
    }
}

/// Detached cancellation handle for a [`Subscription`].
pub struct SubscriptionGuard {
    cancelled: Arc<AtomicBool>,
}

impl SubscriptionGuard {
    /// Cancels the subscription. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MatchRecord;

    fn session(code: &str) -> Session {
        Session::new(SessionCode::parse(code).unwrap(), "user_a".to_owned())
    }

    fn committed(doc: &Session, revision: u64) -> Committed {
        Committed {
            doc: doc.clone(),
            revision,
        }
    }

    #[tokio::test]
    async fn test_baseline_is_delivered_immediately() {
        let notifier = ChangeNotifier::new();
        let doc = session("AB12CD");
        let code = doc.code.clone();

        let mut sub = notifier.subscribe(&code, committed(&doc, 1)).unwrap();
        let baseline = sub.recv().await.unwrap();
        assert_eq!(baseline.code, code);
        assert!(baseline.matches.is_empty());
    }

    #[tokio::test]
    async fn test_changes_arrive_in_commit_order() {
        let notifier = ChangeNotifier::new();
        let doc = session("AB12CD");
        let code = doc.code.clone();

        let mut sub = notifier.subscribe(&code, committed(&doc, 1)).unwrap();
        assert_eq!(sub.recv().await.unwrap().matches.len(), 0);

        let mut v2 = doc.clone();
        v2.append_match(MatchRecord::placeholder(550));
        let mut v3 = v2.clone();
        v3.append_match(MatchRecord::placeholder(603));

        notifier.publish(committed(&v2, 2));
        notifier.publish(committed(&v3, 3));

        assert_eq!(sub.recv().await.unwrap().matches.len(), 1);
        assert_eq!(sub.recv().await.unwrap().matches.len(), 2);
    }

    #[tokio::test]
    async fn test_stale_revision_is_dropped() {
        let notifier = ChangeNotifier::new();
        let doc = session("AB12CD");
        let code = doc.code.clone();

        let mut sub = notifier.subscribe(&code, committed(&doc, 1)).unwrap();
        sub.recv().await.unwrap();

        let mut v3 = doc.clone();
        v3.append_match(MatchRecord::placeholder(550));
        notifier.publish(committed(&v3, 3));
        // A racing writer publishing its older commit after the fact.
        notifier.publish(committed(&doc, 2));

        let mut v4 = v3.clone();
        v4.append_match(MatchRecord::placeholder(603));
        notifier.publish(committed(&v4, 4));

        assert_eq!(sub.recv().await.unwrap().matches.len(), 1);
        assert_eq!(sub.recv().await.unwrap().matches.len(), 2);
    }

    #[tokio::test]
    async fn test_first_subscriber_baseline_outranks_late_older_publish() {
        let notifier = ChangeNotifier::new();
        let mut doc = session("AB12CD");
        doc.append_match(MatchRecord::placeholder(550));
        let code = doc.code.clone();

        // First interest in the code arrives via subscribe, with a read at
        // revision 5; the channel is seeded with that revision.
        let mut sub = notifier.subscribe(&code, committed(&doc, 5)).unwrap();
        assert_eq!(sub.recv().await.unwrap().matches.len(), 1);

        // A slow writer now publishes the commit from before that read; it
        // must not surface after the fresher baseline.
        notifier.publish(committed(&session("AB12CD"), 4));

        let mut v6 = doc.clone();
        v6.append_match(MatchRecord::placeholder(603));
        notifier.publish(committed(&v6, 6));

        assert_eq!(sub.recv().await.unwrap().matches.len(), 2);
    }

    #[tokio::test]
    async fn test_subscriber_skips_commits_older_than_its_baseline() {
        let notifier = ChangeNotifier::new();
        let doc = session("AB12CD");
        let code = doc.code.clone();

        let mut v2 = doc.clone();
        v2.record_vote(550, "user_a".to_owned(), true);
        let mut v3 = v2.clone();
        v3.append_match(MatchRecord::placeholder(550));
        let mut v4 = v3.clone();
        v4.append_match(MatchRecord::placeholder(603));

        // An early subscriber pins the channel at revision 1.
        let mut early = notifier.subscribe(&code, committed(&doc, 1)).unwrap();
        early.recv().await.unwrap();

        // A later subscriber read the store at revision 3.
        let mut late = notifier.subscribe(&code, committed(&v3, 3)).unwrap();
        assert_eq!(late.recv().await.unwrap().matches.len(), 1);

        // Revision 2 arrives late: news for the early subscriber, stale
        // for the late one.
        notifier.publish(committed(&v2, 2));
        notifier.publish(committed(&v4, 4));

        assert!(early.recv().await.unwrap().swipes.contains_key(&550));
        assert_eq!(early.recv().await.unwrap().matches.len(), 2);

        assert_eq!(late.recv().await.unwrap().matches.len(), 2);
    }

    #[tokio::test]
    async fn test_later_subscriber_gets_latest_baseline() {
        let notifier = ChangeNotifier::new();
        let doc = session("AB12CD");
        let code = doc.code.clone();

        let mut first = notifier.subscribe(&code, committed(&doc, 1)).unwrap();
        first.recv().await.unwrap();

        let mut v2 = doc.clone();
        v2.append_match(MatchRecord::placeholder(550));
        notifier.publish(committed(&v2, 2));

        // The second subscriber passes a stale read; the notifier's newer
        // snapshot wins as its baseline.
        let mut second = notifier.subscribe(&code, committed(&doc, 1)).unwrap();
        assert_eq!(second.recv().await.unwrap().matches.len(), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_is_final_and_idempotent() {
        let notifier = ChangeNotifier::new();
        let doc = session("AB12CD");
        let code = doc.code.clone();

        let mut sub = notifier.subscribe(&code, committed(&doc, 1)).unwrap();
        sub.unsubscribe();
        sub.unsubscribe();

        assert!(sub.recv().await.is_none());

        notifier.publish(committed(&doc, 2));
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_guard_cancels_from_outside() {
        let notifier = ChangeNotifier::new();
        let doc = session("AB12CD");
        let code = doc.code.clone();

        let mut sub = notifier.subscribe(&code, committed(&doc, 1)).unwrap();
        let guard = sub.guard();
        guard.cancel();
        guard.cancel();

        assert!(sub.recv().await.is_none());
    }
}
