//! In-memory session storage.
//!
//! Suitable for tests and single-process deployments. Two clients in the
//! same process share one instance behind an `Arc`.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::SessionError;

use super::store::{Committed, CreateOutcome, SessionStore};
use super::{Session, SessionCode};

struct VersionedDoc {
    revision: u64,
    doc: Session,
}

/// In-memory session storage with per-document versioning.
///
/// `atomic_update` is a genuine compare-and-swap: the document is read, the
/// caller's closure runs outside the lock, and the write only lands if the
/// revision is unchanged. A lost race re-applies the closure to the newer
/// document, up to `max_update_attempts` times.
///
/// # Note
///
/// Documents are lost when the process exits. Nothing here expires or
/// deletes sessions; `active` stays a soft flag.
pub struct InMemorySessionStore {
    docs: RwLock<HashMap<SessionCode, VersionedDoc>>,
    max_update_attempts: u32,
}

impl InMemorySessionStore {
    /// Creates an empty store with the default conflict-retry budget.
    pub fn new() -> Self {
        Self::with_max_update_attempts(crate::config::StoreConfig::default().max_update_attempts)
    }

    /// Creates an empty store with an explicit conflict-retry budget.
    pub fn with_max_update_attempts(max_update_attempts: u32) -> Self {
        Self {
            docs: RwLock::new(HashMap::new()),
            max_update_attempts: max_update_attempts.max(1),
        }
    }

    /// Returns the number of session documents currently stored.
    pub fn len(&self) -> usize {
        self.docs.read().map(|guard| guard.len()).unwrap_or(0)
    }

    /// Returns true if there are no session documents stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

fn lock_poisoned() -> SessionError {
    SessionError::StoreUnavailable("Lock poisoned".to_owned())
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create_if_absent(&self, doc: Session) -> Result<CreateOutcome, SessionError> {
        let mut docs = self.docs.write().map_err(|_| lock_poisoned())?;

        if docs.contains_key(&doc.code) {
            return Ok(CreateOutcome::AlreadyExists);
        }

        let committed = Committed {
            doc: doc.clone(),
            revision: 1,
        };
        docs.insert(doc.code.clone(), VersionedDoc { revision: 1, doc });
        Ok(CreateOutcome::Created(committed))
    }

    async fn get_versioned(
        &self,
        code: &SessionCode,
    ) -> Result<Option<Committed>, SessionError> {
        let docs = self.docs.read().map_err(|_| lock_poisoned())?;
        Ok(docs.get(code).map(|v| Committed {
            doc: v.doc.clone(),
            revision: v.revision,
        }))
    }

    async fn atomic_update<F>(
        &self,
        code: &SessionCode,
        mut apply: F,
    ) -> Result<Committed, SessionError>
    where
        F: FnMut(&Session) -> Result<Session, SessionError> + Send,
    {
        for attempt in 0..self.max_update_attempts {
            if attempt > 0 {
                // Lost a CAS race; let the winner finish before re-reading.
                // A networked backend would use a real backoff here.
                tokio::task::yield_now().await;
            }
            let (seen_revision, snapshot) = {
                let docs = self.docs.read().map_err(|_| lock_poisoned())?;
                match docs.get(code) {
                    Some(v) => (v.revision, v.doc.clone()),
                    None => return Err(SessionError::NotFound),
                }
            };

            // The closure runs without holding the lock; the write below
            // only lands if nobody committed in between.
            let next = apply(&snapshot)?;

            let mut docs = self.docs.write().map_err(|_| lock_poisoned())?;
            match docs.get_mut(code) {
                Some(v) if v.revision == seen_revision => {
                    v.revision += 1;
                    v.doc = next;
                    return Ok(Committed {
                        doc: v.doc.clone(),
                        revision: v.revision,
                    });
                }
                Some(_) => continue,
                None => return Err(SessionError::NotFound),
            }
        }

        log::warn!(
            target: "reelmatch::store",
            "atomic_update on {} exhausted {} attempts",
            code,
            self.max_update_attempts
        );
        Err(SessionError::TransientWriteFailure)
    }
}
