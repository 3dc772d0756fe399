//! The outbound half of a live session, as seen by the relay logic.

use async_trait::async_trait;
use thiserror::Error;

use crate::protocol::close::CloseStatus;

/// Errors returned when writing to a session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// The session's writer has gone away (peer disconnected, session ended).
    #[error("session is closed")]
    Closed,
}

/// Trait for delivering frames to one connected peer.
///
/// The WebSocket implementation queues frames for a per-session writer task;
/// tests use an in-memory recorder.  Implementations must be cheap to share
/// behind an `Arc`, since a controller's sink is reachable both from its own
/// session and from its source's pairing directory.
#[async_trait]
pub trait SessionSink: Send + Sync {
    /// Queues a text frame for the peer.
    ///
    /// May suspend while the outbound buffer is full.
    async fn send_text(&self, text: &str) -> Result<(), SinkError>;

    /// Asks the writer to send a close frame with `status` and stop.
    async fn close(&self, status: CloseStatus) -> Result<(), SinkError>;

    /// Returns `false` once the peer can no longer receive frames.
    fn is_active(&self) -> bool;
}
