//! Telemetry relay entry point.
//!
//! Accepts WebSocket sessions from telemetry sources and controllers and
//! relays frames between each source and the controllers paired with it.
//!
//! # Usage
//!
//! ```text
//! telemetry-relay [OPTIONS]
//!
//! Options:
//!   -c, --config <PATH>             TOML config file
//!       --bind <IP>                 Listener IP [default: 0.0.0.0]
//!       --port <PORT>               Listener port [default: 8080]
//!       --source-path <PATH>        Telemetry-source endpoint [default: /ubiquitous]
//!       --controller-path <PATH>    Controller endpoint [default: /mobile]
//!       --ping-interval <SECS>      Keepalive ping interval [default: 10]
//!       --idle-timeout <SECS>       Idle timeout [default: 18]
//!       --outbound-buffer <FRAMES>  Per-session send queue [default: 64]
//! ```
//!
//! # Configuration precedence
//!
//! Built-in defaults, then the config file, then environment variables,
//! then CLI flags.  Each flag has a matching variable:
//!
//! | Variable                 | Flag                |
//! |--------------------------|---------------------|
//! | `RELAY_CONFIG`           | `--config`          |
//! | `RELAY_BIND`             | `--bind`            |
//! | `RELAY_PORT`             | `--port`            |
//! | `RELAY_SOURCE_PATH`      | `--source-path`     |
//! | `RELAY_CONTROLLER_PATH`  | `--controller-path` |
//! | `RELAY_PING_INTERVAL`    | `--ping-interval`   |
//! | `RELAY_IDLE_TIMEOUT`     | `--idle-timeout`    |
//! | `RELAY_OUTBOUND_BUFFER`  | `--outbound-buffer` |
//!
//! Log verbosity comes from `RUST_LOG`, else `[server] log_level` in the
//! config file, else `info`.

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use relay_server::domain::RelayConfig;
use relay_server::infrastructure::{load_config_file, run_server, FileConfig};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Telemetry relay.
///
/// Every option is optional; anything left unset falls back to the config
/// file and then to the built-in default.
#[derive(Debug, Default, Parser)]
#[command(
    name = "telemetry-relay",
    about = "WebSocket relay pairing telemetry sources with their controllers",
    version
)]
struct Cli {
    /// TOML config file.  Read only when given; a missing file is an error.
    #[arg(short, long, env = "RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// IP address to bind the listener to.
    #[arg(long, env = "RELAY_BIND")]
    bind: Option<String>,

    /// TCP port to listen on.  `0` picks a free port.
    #[arg(long, env = "RELAY_PORT")]
    port: Option<u16>,

    /// Request path of the telemetry-source endpoint.
    #[arg(long, env = "RELAY_SOURCE_PATH")]
    source_path: Option<String>,

    /// Request path of the controller endpoint.
    #[arg(long, env = "RELAY_CONTROLLER_PATH")]
    controller_path: Option<String>,

    /// Seconds between keepalive pings on each session.
    #[arg(long, env = "RELAY_PING_INTERVAL")]
    ping_interval: Option<u64>,

    /// Seconds without any inbound frame before a session is closed.
    #[arg(long, env = "RELAY_IDLE_TIMEOUT")]
    idle_timeout: Option<u64>,

    /// Frames queued per session before forwarding to it has to wait.
    #[arg(long, env = "RELAY_OUTBOUND_BUFFER")]
    outbound_buffer: Option<usize>,
}

impl Cli {
    /// Layers the file settings and then these arguments over the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if an address does not parse or the merged
    /// configuration fails validation.
    fn into_relay_config(self, file: &FileConfig) -> anyhow::Result<RelayConfig> {
        let mut config = RelayConfig::default();
        file.apply_to(&mut config)
            .context("invalid config file")?;

        if let Some(bind) = self.bind {
            let ip: IpAddr = bind
                .parse()
                .with_context(|| format!("invalid bind address: '{bind}'"))?;
            config.bind_addr.set_ip(ip);
        }
        if let Some(port) = self.port {
            config.bind_addr.set_port(port);
        }
        if let Some(path) = self.source_path {
            config.source_path = path;
        }
        if let Some(path) = self.controller_path {
            config.controller_path = path;
        }
        if let Some(secs) = self.ping_interval {
            config.ping_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = self.idle_timeout {
            config.idle_timeout = Duration::from_secs(secs);
        }
        if let Some(n) = self.outbound_buffer {
            config.outbound_buffer = n;
        }

        config.validate().context("invalid relay configuration")?;
        Ok(config)
    }
}

/// Builds the log filter: `RUST_LOG`, else the file's level, else `info`.
fn env_filter(file_level: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(file_level.unwrap_or("info")))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // The config file is read before logging starts because it may set the
    // log level.
    let file = match &cli.config {
        Some(path) => load_config_file(path)
            .with_context(|| format!("failed to load config file {}", path.display()))?,
        None => FileConfig::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(file.server.log_level.as_deref()))
        .init();

    let config = cli.into_relay_config(&file)?;

    info!(
        "telemetry relay starting: bind={}, ping={:?}, idle timeout={:?}",
        config.bind_addr, config.ping_interval, config.idle_timeout
    );

    // ── Graceful shutdown flag ────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    run_server(config, running).await?;

    info!("telemetry relay stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
