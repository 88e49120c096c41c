pub mod catalog;
pub mod config;
pub mod coordinator;
pub mod evaluator;
pub mod events;
pub mod notifier;
pub mod session;

pub use catalog::CatalogClient;
pub use catalog::CatalogItem;
pub use catalog::MockCatalogClient;
#[cfg(feature = "tmdb")]
pub use catalog::TmdbCatalogClient;
pub use config::ReelmatchConfig;
pub use coordinator::SessionCoordinator;
pub use events::register_event_listeners;
pub use notifier::ChangeNotifier;
pub use notifier::Subscription;
pub use session::InMemorySessionStore;
pub use session::ItemId;
pub use session::MatchRecord;
pub use session::ParticipantId;
pub use session::Session;
pub use session::SessionCode;
pub use session::SessionStore;

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    NotFound,
    SessionFull,
    InvalidCode(String),
    StoreUnavailable(String),
    TransientWriteFailure,
    CatalogFetchFailure(String),
}

impl std::error::Error for SessionError {}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::NotFound => write!(f, "No active session with that code"),
            SessionError::SessionFull => write!(f, "Session already has two participants"),
            SessionError::InvalidCode(code) => write!(f, "Malformed session code: {}", code),
            SessionError::StoreUnavailable(msg) => write!(f, "Session store unavailable: {}", msg),
            SessionError::TransientWriteFailure => {
                write!(f, "Write conflict retries exhausted; re-attempt the operation")
            }
            SessionError::CatalogFetchFailure(msg) => {
                write!(f, "Catalog metadata fetch failed: {}", msg)
            }
        }
    }
}
