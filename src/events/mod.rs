//! Event system for session activity.
//!
//! Events are fired from every coordinator operation. If no listeners are
//! registered, they are silently ignored (zero overhead).
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use reelmatch::register_event_listeners;
//! use reelmatch::events::listeners::LoggingListener;
//!
//! fn main() {
//!     // register listeners at startup
//!     register_event_listeners(|registry| {
//!         registry.listen(LoggingListener::new());
//!     });
//!
//!     // session activity will now be logged
//! }
//! ```
//!
//! # Custom Listeners
//!
//! Implement the [`Listener`] trait to create custom event handlers:
//!
//! ```rust,ignore
//! use reelmatch::events::{SessionEvent, Listener};
//! use async_trait::async_trait;
//!
//! struct MatchCounter;
//!
//! #[async_trait]
//! impl Listener for MatchCounter {
//!     async fn handle(&self, event: &SessionEvent) {
//!         if let SessionEvent::MatchFound { .. } = event {
//!             // increment match counter
//!         }
//!     }
//! }
//! ```

mod event;
mod listener;
mod registry;

pub mod listeners;

pub use event::SessionEvent;
pub use listener::Listener;
pub use registry::{dispatch, register_event_listeners};
