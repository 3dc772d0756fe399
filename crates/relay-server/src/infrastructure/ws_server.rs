//! WebSocket server: accept loop, endpoint routing, and per-session tasks.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address.
//! 2. Upgrading each connection to a WebSocket session, choosing the
//!    session's role from the request path (404 for anything else).
//! 3. Starting the session's writer task (see [`super::ws_sink`]).
//! 4. Running the session loop until the session ends, then closing the
//!    socket the way the ending calls for.
//! 5. Stopping the accept loop when the `running` flag is cleared.
//!
//! # How a session ends
//!
//! | Ending                 | What the peer sees                       |
//! |------------------------|------------------------------------------|
//! | peer closed            | close frame 1000                         |
//! | idle timeout           | close frame 1001 "idle timeout"          |
//! | pairing rejected       | close frame 1003 "no such telemetry source" |
//! | bad handshake / error  | TCP closed with no close frame           |

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use futures_util::StreamExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{
    accept_hdr_async,
    tungstenite::{
        error::ProtocolError as WsProtocolError,
        handshake::server::{ErrorResponse, Request, Response},
        http::StatusCode,
        Error as WsError, Message as WsMessage,
    },
};
use tracing::{debug, error, info, warn};

use relay_core::{CloseStatus, Role, SessionSink};

use crate::application::{run_session, RelayError, RelayService, SessionEnd};
use crate::domain::{InboundFrame, RelayConfig};
use crate::infrastructure::ws_sink::{run_writer, ChannelSink, Outbound};

/// How long a finished session waits for its writer to flush the close frame.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// How often the accept loop wakes up to check the shutdown flag.
const ACCEPT_POLL: Duration = Duration::from_millis(200);

// ── Public API ────────────────────────────────────────────────────────────────

/// A bound relay, ready to accept sessions.
///
/// Binding and running are separate steps so callers (and tests) can learn
/// the actual port before the accept loop starts.
pub struct RelayServer {
    listener: TcpListener,
    config: Arc<RelayConfig>,
    service: Arc<RelayService>,
}

impl RelayServer {
    /// Binds the listener on `config.bind_addr` with a fresh [`RelayService`].
    ///
    /// # Errors
    ///
    /// Returns an error if the address is in use or cannot be bound.
    pub async fn bind(config: RelayConfig) -> anyhow::Result<Self> {
        Self::bind_with_service(config, Arc::new(RelayService::new())).await
    }

    /// Binds the listener and serves sessions from an existing `service`.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is in use or cannot be bound.
    pub async fn bind_with_service(
        config: RelayConfig,
        service: Arc<RelayService>,
    ) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .with_context(|| format!("failed to bind relay listener on {}", config.bind_addr))?;
        Ok(Self {
            listener,
            config: Arc::new(config),
            service,
        })
    }

    /// The address actually bound (useful when the configured port is 0).
    ///
    /// # Errors
    ///
    /// Returns an error if the OS cannot report the socket address.
    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("failed to read relay listener address")
    }

    /// The shared relay state behind every session.
    pub fn service(&self) -> Arc<RelayService> {
        Arc::clone(&self.service)
    }

    /// Accepts sessions until `running` is set to `false`.
    ///
    /// Sessions already in progress keep running on their own tasks.
    ///
    /// # Errors
    ///
    /// Currently never fails once bound; accept errors are logged and the
    /// loop continues.
    pub async fn run(self, running: Arc<AtomicBool>) -> anyhow::Result<()> {
        match self.local_addr() {
            Ok(addr) => info!(
                "relay listening on {addr} (source: {}, controller: {})",
                self.config.source_path, self.config.controller_path
            ),
            Err(e) => warn!("{e:#}"),
        }

        loop {
            if !running.load(Ordering::Relaxed) {
                info!("shutdown flag set; stopping accept loop");
                break;
            }

            match timeout(ACCEPT_POLL, self.listener.accept()).await {
                Ok(Ok((stream, peer_addr))) => {
                    debug!("new connection from {peer_addr}");
                    let config = Arc::clone(&self.config);
                    let service = Arc::clone(&self.service);
                    tokio::spawn(async move {
                        handle_connection(stream, peer_addr, config, service).await;
                    });
                }
                Ok(Err(e)) => {
                    // Transient (e.g. out of file descriptors); keep serving.
                    error!("accept error: {e}");
                }
                Err(_) => {
                    // No connection in the last poll window.
                }
            }
        }

        Ok(())
    }
}

/// Binds on `config.bind_addr` and serves until `running` is cleared.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound.
pub async fn run_server(config: RelayConfig, running: Arc<AtomicBool>) -> anyhow::Result<()> {
    RelayServer::bind(config).await?.run(running).await
}

/// Maps a request path to the endpoint it addresses.
pub fn route(path: &str, config: &RelayConfig) -> Option<Role> {
    if path == config.source_path {
        Some(Role::Source)
    } else if path == config.controller_path {
        Some(Role::Controller)
    } else {
        None
    }
}

// ── Per-session handler ───────────────────────────────────────────────────────

async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    config: Arc<RelayConfig>,
    service: Arc<RelayService>,
) {
    let mut role = None;
    let upgrade = accept_hdr_async(stream, |request: &Request, response: Response| {
        match route(request.uri().path(), &config) {
            Some(r) => {
                role = Some(r);
                Ok(response)
            }
            None => Err(not_found(request.uri().path())),
        }
    })
    .await;

    let ws_stream = match upgrade {
        Ok(ws) => ws,
        Err(e) => {
            debug!("{peer_addr}: upgrade refused: {e}");
            return;
        }
    };
    let Some(role) = role else {
        return;
    };

    let (ws_tx, ws_rx) = ws_stream.split();
    let (out_tx, out_rx) = mpsc::channel(config.outbound_buffer);
    let closer = ChannelSink::new(out_tx.clone());
    let sink: Arc<dyn SessionSink> = Arc::new(ChannelSink::new(out_tx));
    let connection = service.accept(role, sink);
    let label = format!("{role} {} ({peer_addr})", connection.id());

    let mut writer = tokio::spawn(run_writer(
        ws_tx,
        out_rx,
        config.ping_interval,
        label.clone(),
    ));

    let frames = ws_rx.map(inbound_frame);
    let result = run_session(service, connection, frames, config.idle_timeout).await;

    let farewell = match &result {
        Ok(SessionEnd::PeerClosed) => {
            info!("{label}: closed by peer");
            Some(CloseStatus::normal())
        }
        Ok(SessionEnd::IdleTimeout) => {
            info!("{label}: idle timeout");
            Some(CloseStatus::idle_timeout())
        }
        Ok(SessionEnd::Rejected) => {
            info!("{label}: pairing rejected");
            None
        }
        Err(e) => {
            warn!("{label}: {e}");
            writer.abort();
            return;
        }
    };

    if let Some(status) = farewell {
        // The writer may already be gone if the socket failed.
        let _ = timeout(CLOSE_GRACE, closer.close(status)).await;
    }
    if timeout(CLOSE_GRACE, &mut writer).await.is_err() {
        debug!("{label}: writer did not finish, aborting");
        writer.abort();
    }
}

/// Converts one tungstenite read result into the session loop's frame model.
fn inbound_frame(message: Result<WsMessage, WsError>) -> Result<InboundFrame, RelayError> {
    match message {
        Ok(WsMessage::Text(text)) => Ok(InboundFrame::Text(text)),
        Ok(WsMessage::Binary(data)) => Ok(InboundFrame::Binary(data)),
        Ok(WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_)) => {
            Ok(InboundFrame::Control)
        }
        Ok(WsMessage::Close(_)) => Ok(InboundFrame::Close),
        Err(
            WsError::ConnectionClosed
            | WsError::AlreadyClosed
            | WsError::Protocol(WsProtocolError::ResetWithoutClosingHandshake),
        ) => Ok(InboundFrame::Close),
        Err(e) => Err(RelayError::Transport(e.to_string())),
    }
}

fn not_found(path: &str) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(format!("no endpoint at {path}")));
    *response.status_mut() = StatusCode::NOT_FOUND;
    response
}

// ── Tests ─────────────────────────────────────────────────────────────────────
