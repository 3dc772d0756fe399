//! Relay configuration types.
//!
//! [`RelayConfig`] is the single source of truth for all runtime settings.
//! `main.rs` builds it by layering the config file, environment variables,
//! and CLI flags over [`RelayConfig::default`], then calls
//! [`RelayConfig::validate`] before anything is bound.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

/// Reasons a [`RelayConfig`] is rejected at startup.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvalidConfig {
    /// A session would time out between two of its own keepalive pings.
    #[error("idle timeout ({idle:?}) must be longer than the ping interval ({ping:?})")]
    IdleTimeoutTooShort { ping: Duration, idle: Duration },

    /// The ping interval is zero.
    #[error("ping interval must be greater than zero")]
    ZeroPingInterval,

    /// An endpoint path does not start with `/`.
    #[error("endpoint path '{0}' must start with '/'")]
    RelativePath(String),

    /// Both endpoints were given the same path.
    #[error("source and controller endpoints must differ (both are '{0}')")]
    SamePath(String),

    /// The outbound queue would have no capacity.
    #[error("outbound buffer must hold at least one frame")]
    ZeroOutboundBuffer,
}

/// All runtime configuration for the relay.
///
/// Build this once at startup and share it behind an `Arc`.
///
/// # Example
///
/// ```rust
/// use relay_server::domain::RelayConfig;
///
/// let cfg = RelayConfig::default();
/// assert_eq!(cfg.bind_addr.port(), 8080);
/// assert!(cfg.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: SocketAddr,

    /// Request path of the telemetry-source endpoint.
    pub source_path: String,

    /// Request path of the controller endpoint.
    pub controller_path: String,

    /// How often each session's writer sends a WebSocket Ping.
    pub ping_interval: Duration,

    /// A session that receives nothing (not even a Pong) for this long is
    /// closed.
    pub idle_timeout: Duration,

    /// Frames queued per session before a forwarding send has to wait.
    pub outbound_buffer: usize,
}

impl Default for RelayConfig {
    /// | Field           | Default         |
    /// |-----------------|-----------------|
    /// | bind_addr       | `0.0.0.0:8080`  |
    /// | source_path     | `/ubiquitous`   |
    /// | controller_path | `/mobile`       |
    /// | ping_interval   | 10 seconds      |
    /// | idle_timeout    | 18 seconds      |
    /// | outbound_buffer | 64 frames       |
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            source_path: "/ubiquitous".to_string(),
            controller_path: "/mobile".to_string(),
            ping_interval: Duration::from_secs(10),
            // One ping interval plus 8 s for the pong to arrive.
            idle_timeout: Duration::from_secs(18),
            outbound_buffer: 64,
        }
    }
}

impl RelayConfig {
    /// Checks the cross-field rules that the individual types cannot express.
    ///
    /// # Errors
    ///
    /// Returns the first [`InvalidConfig`] rule that is violated.
    pub fn validate(&self) -> Result<(), InvalidConfig> {
        if self.ping_interval.is_zero() {
            return Err(InvalidConfig::ZeroPingInterval);
        }
        if self.idle_timeout <= self.ping_interval {
            return Err(InvalidConfig::IdleTimeoutTooShort {
                ping: self.ping_interval,
                idle: self.idle_timeout,
            });
        }
        for path in [&self.source_path, &self.controller_path] {
            if !path.starts_with('/') {
                return Err(InvalidConfig::RelativePath(path.clone()));
            }
        }
        if self.source_path == self.controller_path {
            return Err(InvalidConfig::SamePath(self.source_path.clone()));
        }
        if self.outbound_buffer == 0 {
            return Err(InvalidConfig::ZeroOutboundBuffer);
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
