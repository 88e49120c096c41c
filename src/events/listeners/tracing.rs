use async_trait::async_trait;

use crate::events::{Listener, SessionEvent};

/// Emits session events as tracing events.
///
/// Requires the `tracing` feature to be enabled.
///
/// # Example
///
/// ```rust,ignore
/// use reelmatch::register_event_listeners;
/// use reelmatch::events::listeners::TracingListener;
///
/// register_event_listeners(|registry| {
///     registry.listen(TracingListener);
/// });
/// ```
pub struct TracingListener;

#[async_trait]
impl Listener for TracingListener {
    async fn handle(&self, event: &SessionEvent) {
        tracing::info!(
            target: "reelmatch::events",
            event_name = event.name(),
            ?event,
            "session event"
        );
    }
}
