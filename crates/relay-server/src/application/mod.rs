//! Application layer for relay-server.
//!
//! # Responsibilities
//!
//! - Deciding what each text frame means (handshake or data) and where it
//!   goes (`relay_service`)
//! - Pumping one session's frames with an idle timeout and guaranteed
//!   cleanup (`session_loop`)
//! - Defining the `RelayError` type for session-ending failures
//!
//! # What does NOT belong here?
//!
//! - Opening sockets or listening for connections (that is infrastructure)
//! - WebSocket framing, pings, and close frames (handled by the session writer)

pub mod relay_service;
pub mod session_loop;

pub use relay_service::{key_prefix, FrameOutcome, RelayConnection, RelayError, RelayService};
pub use session_loop::{run_session, SessionEnd};
