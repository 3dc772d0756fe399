//! # relay-core
//!
//! Shared library for the telemetry relay containing the JSON wire protocol
//! and the concurrency-safe connection model that the server drives.
//!
//! This crate has zero dependencies on sockets, async runtimes, or the
//! WebSocket library.  Everything that touches the network lives in
//! `relay-server`.
//!
//! # Architecture overview (for beginners)
//!
//! The relay pairs a fixed sensing unit (the **telemetry source**) with any
//! number of remote apps (the **controllers**).  Both sides keep a persistent
//! WebSocket open to the relay:
//!
//! ```text
//! telemetry source ──StatusReport──►  relay  ──StatusReport──► controller A
//!                                       │    ──StatusReport──► controller B
//! telemetry source ◄─ThresholdUpdate── relay ◄─ThresholdUpdate── controller A
//! ```
//!
//! This crate defines:
//!
//! - **`protocol`** – The JSON messages exchanged on both endpoints and the
//!   strict/lenient decoders used to validate them.
//!
//! - **`domain`** – The live-connection model: identifiers, the two
//!   connection variants and their one-shot configuration slots, the
//!   per-source pairing directory, and the registry that hands out
//!   collision-free identifiers.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `relay_core::ConnectionRegistry` instead of the full module path.
pub use domain::connection::{
    AlreadyConfigured, Connection, ConnectionId, ControllerConfig, ControllerConnection, Role,
    SourceConfig, SourceConnection,
};
pub use domain::pairing::PairingDirectory;
pub use domain::registry::ConnectionRegistry;
pub use domain::session::{SessionSink, SinkError};
pub use protocol::close::CloseStatus;
pub use protocol::codec::{
    decode_handshake, decode_status_report, decode_threshold_update, ProtocolError,
};
pub use protocol::messages::{Handshake, StatusReport, ThresholdUpdate, WifiStatus};
