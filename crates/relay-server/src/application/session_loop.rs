//! Per-connection message pump.
//!
//! [`run_session`] owns one connection from the moment it is registered
//! until it ends.  It reads frames with an idle timeout, hands text frames
//! to [`RelayService::handle_text`], and returns a [`SessionEnd`] (or the
//! fatal [`RelayError`]) for the caller to log and act on.
//!
//! Cleanup lives in a drop guard rather than after the loop, so the
//! connection leaves its registry and its source's directory exactly once
//! no matter how the future stops: normal return, `?`, panic, or the task
//! being cancelled mid-await.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::application::relay_service::{FrameOutcome, RelayConnection, RelayError, RelayService};
use crate::domain::frame::InboundFrame;

/// How a session ended without a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The peer sent a close frame or the stream ended.
    PeerClosed,
    /// Nothing arrived within the idle timeout.
    IdleTimeout,
    /// A controller's handshake matched no source.  The rejection close
    /// status has already been queued on its sink.
    Rejected,
}

/// Runs `connection`'s message pump until the session ends.
///
/// `frames` yields the connection's inbound messages.  Every item,
/// including control frames, restarts the `idle_timeout` window.
///
/// # Errors
///
/// Returns [`RelayError::Handshake`] when the first text frame is not a
/// valid handshake, and [`RelayError::Transport`] when `frames` yields an
/// error.  Cleanup has already happened by the time either is returned.
pub async fn run_session<S>(
    service: Arc<RelayService>,
    connection: RelayConnection,
    mut frames: S,
    idle_timeout: Duration,
) -> Result<SessionEnd, RelayError>
where
    S: Stream<Item = Result<InboundFrame, RelayError>> + Unpin,
{
    let _cleanup = CleanupGuard {
        service: Arc::clone(&service),
        connection: connection.clone(),
    };
    let label = format!("{} {}", connection.role(), connection.id());

    loop {
        let frame = match timeout(idle_timeout, frames.next()).await {
            Err(_) => {
                debug!("{label}: idle for {idle_timeout:?}");
                return Ok(SessionEnd::IdleTimeout);
            }
            Ok(None) => return Ok(SessionEnd::PeerClosed),
            Ok(Some(result)) => result?,
        };

        match frame {
            InboundFrame::Text(text) => {
                if service.handle_text(&connection, &text).await? == FrameOutcome::Rejected {
                    return Ok(SessionEnd::Rejected);
                }
            }
            InboundFrame::Close => return Ok(SessionEnd::PeerClosed),
            other => trace!("{label}: ignoring {} frame", other.kind()),
        }
    }
}

/// Releases the connection when the session future is dropped.
struct CleanupGuard {
    service: Arc<RelayService>,
    connection: RelayConnection,
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        self.service.release(&self.connection);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
