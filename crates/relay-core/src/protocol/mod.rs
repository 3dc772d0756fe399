//! Protocol module containing the JSON message types, the decoders, and the
//! close statuses the relay sends.

pub mod close;
pub mod codec;
pub mod messages;

pub use close::CloseStatus;
pub use codec::{decode_handshake, decode_status_report, decode_threshold_update, ProtocolError};
pub use messages::*;
