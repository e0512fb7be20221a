//! Session and transfer listeners
//!
//! Callers that want to observe a session (console echo, progress bars)
//! register a listener instead of relying on process-wide state.

use grblsend_core::Error;
use std::sync::Arc;

/// Observer of controller traffic and transfer progress
pub trait SessionListener: Send + Sync {
    /// Informational line received while waiting for an acknowledgment
    fn on_message(&self, _line: &str) {}

    /// Called every `progress_interval` acknowledged lines
    fn on_progress(&self, _lines_sent: usize) {}

    /// A transfer stopped on `error`. `line` is the 1-based input position,
    /// or `None` for the feed-rate prefix and the closing tool command.
    fn on_command_failed(&self, _line: Option<usize>, _command: &str, _error: &Error) {}
}

/// Shared listener handle
pub type SessionListenerHandle = Arc<dyn SessionListener>;

/// Listener that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpListener;

impl SessionListener for NoOpListener {}

/// Handle to a [`NoOpListener`]
pub fn noop_listener() -> SessionListenerHandle {
    Arc::new(NoOpListener)
}
