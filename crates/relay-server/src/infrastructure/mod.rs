//! Infrastructure layer for relay-server.
//!
//! # Responsibilities
//!
//! - Binding the TCP listener and performing the WebSocket upgrade
//! - Routing each upgrade to the source or controller endpoint by path
//! - Owning each socket's write half (queue, keepalive pings, close frames)
//! - Reading the optional TOML config file
//!
//! # What does NOT belong here?
//!
//! - Pairing and forwarding rules (that is the application layer)
//! - Deciding what a frame means (same)

pub mod config_file;
pub mod ws_server;
pub mod ws_sink;

pub use config_file::{load_config_file, ConfigError, FileConfig};
pub use ws_server::{run_server, RelayServer};
