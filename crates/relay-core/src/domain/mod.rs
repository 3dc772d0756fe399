//! Domain model for the telemetry relay.
//!
//! This module contains the shared state that concurrent sessions read and
//! mutate, with no dependency on sockets or on a particular async runtime.
//!
//! # Ownership at a glance (for beginners)
//!
//! ```text
//! ConnectionRegistry<SourceConnection>        ConnectionRegistry<ControllerConnection>
//!   └─ Arc<SourceConnection>                    └─ Arc<ControllerConnection>
//!        └─ SourceConfig                              └─ ControllerConfig
//!             └─ PairingDirectory ──Arc──────────────►      paired_source: ConnectionId
//! ```
//!
//! A source's [`pairing::PairingDirectory`] keeps an `Arc` to each paired
//! controller so it can reach the controller's session when broadcasting.
//! The controller points back at its source only *by identifier*, which the
//! session resolves through the source registry on each forward.  Because
//! the back-edge is not a pointer, there is no reference cycle to leak and
//! no way to write into a source that has already disconnected.
//!
//! Every lock in this module guards a plain map mutation and is released
//! before any `.await`.  A stalled peer can therefore slow down its own
//! session but never a registry operation for anyone else.

pub mod connection;
pub mod pairing;
pub mod registry;
pub mod session;

pub use connection::{
    AlreadyConfigured, Connection, ConnectionId, ControllerConfig, ControllerConnection, Role,
    SourceConfig, SourceConnection,
};
pub use pairing::PairingDirectory;
pub use registry::ConnectionRegistry;
pub use session::{SessionSink, SinkError};
