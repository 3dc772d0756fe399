//! relay-server library crate.
//!
//! Accepts WebSocket sessions from telemetry sources and controllers, pairs
//! them by identity key, and relays frames between each source and its
//! controllers.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! telemetry source (JSON over WebSocket)        controllers (JSON over WebSocket)
//!         ↕                                              ↕
//! [relay-server]
//!   ├── domain/           Pure types: RelayConfig, InboundFrame
//!   ├── application/      Relay protocol rules and the per-session loop
//!   └── infrastructure/
//!         ├── ws_server/  Accept loop, endpoint routing (tokio-tungstenite)
//!         ├── ws_sink/    Per-session writer task with keepalive pings
//!         └── config_file/ Optional TOML configuration
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` depends on `domain` and `relay-core` only.  It never sees
//!   a socket: frames arrive as a `Stream` and leave through `SessionSink`.
//! - `infrastructure` depends on all other layers plus `tokio` and `tungstenite`.
//!
//! # For beginners: why this structure?
//!
//! The pairing and forwarding rules are where the bugs would hide, so they
//! live in the application layer where tests can drive them with in-memory
//! streams and recording sinks instead of real sockets.

/// Domain layer: configuration and the transport-neutral frame model.
pub mod domain;

/// Application layer: relay protocol and session loop.
pub mod application;

/// Infrastructure layer: WebSocket server, session writer, config file.
pub mod infrastructure;
