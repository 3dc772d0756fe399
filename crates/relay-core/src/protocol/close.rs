//! Close statuses the relay sends when it ends a session on purpose.

/// WebSocket close code 1000, normal closure.
pub const NORMAL: u16 = 1000;

/// WebSocket close code 1001, "going away".
pub const GOING_AWAY: u16 = 1001;

/// WebSocket close code 1003, "cannot accept".
///
/// RFC 6455 reserves it for endpoints that receive data they cannot accept;
/// the relay uses it for a controller that asked for a source nobody has
/// registered.
pub const CANNOT_ACCEPT: u16 = 1003;

/// A close code plus a short human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseStatus {
    pub code: u16,
    pub reason: String,
}

impl CloseStatus {
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Sent when the relay ends a session after the peer closed it.
    pub fn normal() -> Self {
        Self::new(NORMAL, "")
    }

    /// Sent when a session saw no frame within the idle timeout.
    pub fn idle_timeout() -> Self {
        Self::new(GOING_AWAY, "idle timeout")
    }

    /// The controlled rejection sent when a controller handshake names an
    /// identity key that matches no configured telemetry source.
    pub fn no_such_source() -> Self {
        Self::new(CANNOT_ACCEPT, "no such telemetry source")
    }

    /// `true` for the pairing rejection status.
    pub fn is_no_such_source(&self) -> bool {
        self.code == CANNOT_ACCEPT && self.reason == "no such telemetry source"
    }
}
