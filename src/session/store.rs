//! Session store contract.

use async_trait::async_trait;

use crate::SessionError;

use super::{Session, SessionCode};

/// Outcome of [`SessionStore::create_if_absent`].
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    /// The document was created; carries the committed state.
    Created(Committed),
    /// A document already exists under that code; nothing was written.
    AlreadyExists,
}

/// A successfully committed document state.
///
/// `revision` increases by one per committed write to a given code and
/// orders snapshot delivery downstream.
#[derive(Debug, Clone, PartialEq)]
pub struct Committed {
    pub doc: Session,
    pub revision: u64,
}

/// Durable keyed document store, one document per session code.
///
/// `atomic_update` is the concurrency backbone of the protocol: it must
/// provide read-modify-write atomicity at document granularity so that two
/// simultaneous writers never drop each other's changes. Implementations
/// retry on conflict a bounded number of times and surface
/// [`SessionError::TransientWriteFailure`] once retries are exhausted.
///
/// Implementations:
/// - [`InMemorySessionStore`](super::InMemorySessionStore): versioned
///   in-process storage for tests and single-process deployments
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Atomically creates the document unless one exists under its code.
    async fn create_if_absent(&self, doc: Session) -> Result<CreateOutcome, SessionError>;

    /// Reads the current document, `None` if the code is unknown.
    async fn get(&self, code: &SessionCode) -> Result<Option<Session>, SessionError> {
        Ok(self.get_versioned(code).await?.map(|committed| committed.doc))
    }

    /// Reads the current document together with its commit revision.
    ///
    /// The revision is what seeds snapshot subscriptions: a subscriber's
    /// baseline must carry the revision of the read it came from so that a
    /// late publish of an older commit can be recognized as stale.
    async fn get_versioned(&self, code: &SessionCode)
        -> Result<Option<Committed>, SessionError>;

    /// Applies `apply` to the current document under optimistic concurrency
    /// and commits the result.
    ///
    /// `apply` may run more than once (once per conflict retry) and must be
    /// a pure function of its input. An `Err` return aborts the update
    /// without retrying; that is how terminal conditions like
    /// [`SessionError::SessionFull`] pass through.
    async fn atomic_update<F>(
        &self,
        code: &SessionCode,
        apply: F,
    ) -> Result<Committed, SessionError>
    where
        F: FnMut(&Session) -> Result<Session, SessionError> + Send;
}
