//! Transport-neutral view of one received message.

/// One inbound WebSocket message, reduced to what the session loop cares
/// about.
///
/// The infrastructure layer maps tungstenite messages onto this enum so the
/// session loop can be driven by an in-memory stream in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    /// A text frame.  The only kind the relay protocol interprets.
    Text(String),
    /// A binary frame.  Ignored by the relay.
    Binary(Vec<u8>),
    /// A ping, pong, or raw frame.  Carries no payload for the relay but
    /// still counts as activity for the idle timeout.
    Control,
    /// The peer started the closing handshake or the stream ended cleanly.
    Close,
}

impl InboundFrame {
    /// Short name for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            InboundFrame::Text(_) => "text",
            InboundFrame::Binary(_) => "binary",
            InboundFrame::Control => "control",
            InboundFrame::Close => "close",
        }
    }
}
