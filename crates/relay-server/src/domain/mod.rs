//! Domain layer for relay-server.
//!
//! Plain data types with no dependencies on sockets, files, or the async
//! runtime.
//!
//! # What does NOT belong here?
//!
//! - Any `tokio`, `TcpStream`, or `WebSocket` types
//! - File I/O or environment variable reading

pub mod config;
pub mod frame;

pub use config::{InvalidConfig, RelayConfig};
pub use frame::InboundFrame;
