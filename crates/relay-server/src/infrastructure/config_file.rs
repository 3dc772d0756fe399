//! TOML configuration file.
//!
//! The file is optional and only read when `--config <PATH>` (or
//! `RELAY_CONFIG`) names it.  Every field is optional; whatever is present
//! overrides the built-in default, and environment variables and CLI flags
//! override the file in turn.
//!
//! ```toml
//! [server]
//! bind_address = "0.0.0.0"
//! port = 8080
//! source_path = "/ubiquitous"
//! controller_path = "/mobile"
//! log_level = "info"
//!
//! [session]
//! ping_interval_secs = 10
//! idle_timeout_secs = 18
//! outbound_buffer = 64
//! ```

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::domain::RelayConfig;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// `bind_address` is not an IP address.
    #[error("invalid bind address '{0}'")]
    InvalidAddress(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Contents of the config file.  Absent tables and fields are `None`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub session: SessionSection,
}

/// `[server]` table.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ServerSection {
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub source_path: Option<String>,
    pub controller_path: Option<String>,
    /// `tracing` filter used when `RUST_LOG` is unset, e.g. `"debug"`.
    pub log_level: Option<String>,
}

/// `[session]` table.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct SessionSection {
    pub ping_interval_secs: Option<u64>,
    pub idle_timeout_secs: Option<u64>,
    pub outbound_buffer: Option<usize>,
}

impl FileConfig {
    /// Parses TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the text is not valid TOML for this
    /// schema.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Overwrites the fields of `config` that this file sets.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAddress`] if `bind_address` is not an IP.
    pub fn apply_to(&self, config: &mut RelayConfig) -> Result<(), ConfigError> {
        let server = &self.server;
        if let Some(addr) = &server.bind_address {
            let ip: IpAddr = addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress(addr.clone()))?;
            config.bind_addr.set_ip(ip);
        }
        if let Some(port) = server.port {
            config.bind_addr.set_port(port);
        }
        if let Some(path) = &server.source_path {
            config.source_path = path.clone();
        }
        if let Some(path) = &server.controller_path {
            config.controller_path = path.clone();
        }

        let session = &self.session;
        if let Some(secs) = session.ping_interval_secs {
            config.ping_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = session.idle_timeout_secs {
            config.idle_timeout = Duration::from_secs(secs);
        }
        if let Some(n) = session.outbound_buffer {
            config.outbound_buffer = n;
        }
        Ok(())
    }
}

/// Loads the config file at `path`.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read (including when it
/// does not exist: a path given explicitly must point at a file) and
/// [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    FileConfig::from_toml_str(&content)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
