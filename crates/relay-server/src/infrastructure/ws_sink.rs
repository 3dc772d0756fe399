//! Outbound half of a WebSocket session.
//!
//! Each session has one writer task that owns the socket's write half.
//! Everything else talks to it through a bounded channel:
//!
//! ```text
//! relay logic ──send_text/close──► ChannelSink ──mpsc──► run_writer ──► WebSocket
//!                                                     ▲
//!                                          ping every interval
//! ```
//!
//! Keeping a single writer means frames forwarded by other sessions, the
//! keepalive ping, and the close frame can never interleave mid-write.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Sink, SinkExt};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::{
    protocol::{frame::coding::CloseCode, CloseFrame},
    Error as WsError, Message as WsMessage,
};
use tracing::debug;

use relay_core::{CloseStatus, SessionSink, SinkError};

/// A request for the writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    Close(CloseStatus),
}

/// [`SessionSink`] backed by the writer task's queue.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<Outbound>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<Outbound>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl SessionSink for ChannelSink {
    async fn send_text(&self, text: &str) -> Result<(), SinkError> {
        self.tx
            .send(Outbound::Text(text.to_owned()))
            .await
            .map_err(|_| SinkError::Closed)
    }

    async fn close(&self, status: CloseStatus) -> Result<(), SinkError> {
        self.tx
            .send(Outbound::Close(status))
            .await
            .map_err(|_| SinkError::Closed)
    }

    fn is_active(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Drains `outbound` into `ws_tx` and pings every `ping_interval`.
///
/// Returns after sending a close frame, when every sender is gone, or when
/// the socket stops accepting writes.  Dropping the receiver on return
/// flips every [`ChannelSink::is_active`] for this session to `false`.
pub async fn run_writer<W>(
    mut ws_tx: W,
    mut outbound: mpsc::Receiver<Outbound>,
    ping_interval: Duration,
    label: String,
) where
    W: Sink<WsMessage, Error = WsError> + Unpin,
{
    let mut ticker = interval(ping_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await; // The first tick fires immediately.

    loop {
        tokio::select! {
            request = outbound.recv() => match request {
                Some(Outbound::Text(text)) => {
                    if let Err(e) = ws_tx.send(WsMessage::Text(text)).await {
                        debug!("{label}: write failed: {e}");
                        break;
                    }
                }
                Some(Outbound::Close(status)) => {
                    debug!("{label}: closing with {} {}", status.code, status.reason);
                    let frame = CloseFrame {
                        code: CloseCode::from(status.code),
                        reason: status.reason.into(),
                    };
                    if let Err(e) = ws_tx.send(WsMessage::Close(Some(frame))).await {
                        debug!("{label}: close frame not sent: {e}");
                    }
                    break;
                }
                None => {
                    let _ = ws_tx.close().await;
                    break;
                }
            },
            _ = ticker.tick() => {
                if let Err(e) = ws_tx.send(WsMessage::Ping(Vec::new())).await {
                    debug!("{label}: keepalive ping failed: {e}");
                    break;
                }
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
