//! Relay protocol: what each text frame means and where it goes.
//!
//! # Frame rules (for beginners)
//!
//! Every session starts unconfigured.  The first text frame is the
//! handshake; everything after it is data.
//!
//! | Session    | State        | Frame               | Action                                   |
//! |------------|--------------|---------------------|------------------------------------------|
//! | source     | unconfigured | `Handshake`         | bind identity key, empty directory       |
//! | source     | configured   | `StatusReport`      | forward verbatim to every live controller |
//! | controller | unconfigured | `Handshake`         | pair with the oldest matching source     |
//! | controller | unconfigured | `Handshake`, no match | close with "no such telemetry source" |
//! | controller | configured   | `ThresholdUpdate`   | forward verbatim to the paired source    |
//!
//! A handshake that fails to decode ends the session.  A data frame that
//! fails to decode is dropped and the session carries on.
//!
//! [`RelayService`] holds the two registries for the whole process.  It is
//! constructed once at startup (or once per test) and shared by every
//! session task behind an `Arc`.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use relay_core::{
    decode_handshake, decode_status_report, decode_threshold_update, CloseStatus, Connection,
    ConnectionId, ConnectionRegistry, ControllerConnection, ProtocolError, Role, SessionSink,
    SourceConnection,
};

/// Errors that end a session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// The first frame of the session was not a valid handshake.
    #[error("handshake rejected: {0}")]
    Handshake(#[from] ProtocolError),

    /// The underlying transport failed mid-session.
    #[error("transport error: {0}")]
    Transport(String),
}

/// What the relay did with one text frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The handshake was applied.
    Configured,
    /// A data frame was forwarded to `delivered` peers (possibly zero).
    Forwarded { delivered: usize },
    /// The frame was discarded and the session continues.
    Dropped,
    /// A controller asked for a source nobody has registered; its session
    /// has been sent the rejection close status.
    Rejected,
}

/// A live connection of either role.
#[derive(Debug, Clone)]
pub enum RelayConnection {
    Source(Arc<SourceConnection>),
    Controller(Arc<ControllerConnection>),
}

impl RelayConnection {
    pub fn id(&self) -> ConnectionId {
        match self {
            RelayConnection::Source(s) => s.id(),
            RelayConnection::Controller(c) => c.id(),
        }
    }

    pub fn role(&self) -> Role {
        match self {
            RelayConnection::Source(_) => Role::Source,
            RelayConnection::Controller(_) => Role::Controller,
        }
    }
}

/// Shared relay state and the per-frame protocol rules.
#[derive(Debug, Default)]
pub struct RelayService {
    sources: ConnectionRegistry<SourceConnection>,
    controllers: ConnectionRegistry<ControllerConnection>,
}

impl RelayService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a service over caller-supplied registries, e.g. ones with a
    /// scripted identifier generator.
    pub fn with_registries(
        sources: ConnectionRegistry<SourceConnection>,
        controllers: ConnectionRegistry<ControllerConnection>,
    ) -> Self {
        Self {
            sources,
            controllers,
        }
    }

    pub fn sources(&self) -> &ConnectionRegistry<SourceConnection> {
        &self.sources
    }

    pub fn controllers(&self) -> &ConnectionRegistry<ControllerConnection> {
        &self.controllers
    }

    // ── Session lifecycle ─────────────────────────────────────────────────────

    /// Registers a new, unconfigured connection on the endpoint for `role`.
    pub fn accept(&self, role: Role, sink: Arc<dyn SessionSink>) -> RelayConnection {
        let connection = match role {
            Role::Source => {
                RelayConnection::Source(self.sources.create(|id| SourceConnection::new(id, sink)))
            }
            Role::Controller => RelayConnection::Controller(
                self.controllers
                    .create(|id| ControllerConnection::new(id, sink)),
            ),
        };
        info!("{role} {} connected", connection.id());
        connection
    }

    /// Removes `connection` from every structure that refers to it.
    ///
    /// Safe to call more than once.
    pub fn release(&self, connection: &RelayConnection) {
        match connection {
            RelayConnection::Source(source) => {
                self.sources.remove(source.id());
            }
            RelayConnection::Controller(controller) => {
                self.controllers.remove(controller.id());
                if let Some(source) = controller
                    .paired_source()
                    .and_then(|id| self.sources.get(id))
                {
                    if let Some(directory) = source.controllers() {
                        directory.remove(controller.id());
                    }
                }
            }
        }
        debug!("{} {} released", connection.role(), connection.id());
    }

    // ── Frame handling ────────────────────────────────────────────────────────

    /// Applies the relay protocol to one text frame.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Handshake`] if the frame was meant to be a
    /// handshake and did not decode.  Every other problem is reported as
    /// [`FrameOutcome::Dropped`].
    pub async fn handle_text(
        &self,
        connection: &RelayConnection,
        text: &str,
    ) -> Result<FrameOutcome, RelayError> {
        match connection {
            RelayConnection::Source(source) => self.handle_source_text(source, text).await,
            RelayConnection::Controller(controller) => {
                self.handle_controller_text(controller, text).await
            }
        }
    }

    async fn handle_source_text(
        &self,
        source: &SourceConnection,
        text: &str,
    ) -> Result<FrameOutcome, RelayError> {
        let Some(directory) = source.controllers() else {
            let handshake = decode_handshake(text)?;
            let key = key_prefix(&handshake.public_key).to_owned();
            return match source.configure(handshake.public_key) {
                Ok(()) => {
                    info!("source {} registered key {key}…", source.id());
                    Ok(FrameOutcome::Configured)
                }
                Err(e) => {
                    debug!("{e}");
                    Ok(FrameOutcome::Dropped)
                }
            };
        };

        if let Err(e) = decode_status_report(text) {
            debug!("source {}: dropping frame: {e}", source.id());
            return Ok(FrameOutcome::Dropped);
        }

        // Sends happen on a snapshot so the directory lock is never held
        // across an await.
        let mut delivered = 0;
        for controller in directory.snapshot() {
            if !controller.sink().is_active() {
                continue;
            }
            match controller.sink().send_text(text).await {
                Ok(()) => delivered += 1,
                Err(e) => debug!(
                    "source {} → controller {}: {e}",
                    source.id(),
                    controller.id()
                ),
            }
        }
        debug!("source {}: status report delivered to {delivered}", source.id());
        Ok(FrameOutcome::Forwarded { delivered })
    }

    async fn handle_controller_text(
        &self,
        controller: &Arc<ControllerConnection>,
        text: &str,
    ) -> Result<FrameOutcome, RelayError> {
        let Some(source_id) = controller.paired_source() else {
            let handshake = decode_handshake(text)?;
            return self.pair(controller, handshake.public_key).await;
        };

        if let Err(e) = decode_threshold_update(text) {
            debug!("controller {}: dropping frame: {e}", controller.id());
            return Ok(FrameOutcome::Dropped);
        }

        let Some(source) = self.sources.get(source_id) else {
            debug!(
                "controller {}: paired source {source_id} is gone, dropping frame",
                controller.id()
            );
            return Ok(FrameOutcome::Dropped);
        };

        match source.sink().send_text(text).await {
            Ok(()) => {
                debug!("controller {} → source {source_id}", controller.id());
                Ok(FrameOutcome::Forwarded { delivered: 1 })
            }
            Err(e) => {
                debug!("controller {} → source {source_id}: {e}", controller.id());
                Ok(FrameOutcome::Dropped)
            }
        }
    }

    /// Pairs `controller` with the oldest configured source holding
    /// `identity_key`, or rejects it.
    async fn pair(
        &self,
        controller: &Arc<ControllerConnection>,
        identity_key: String,
    ) -> Result<FrameOutcome, RelayError> {
        let key = key_prefix(&identity_key).to_owned();

        let Some(source) = self.sources.find(|s| s.has_identity_key(&identity_key)) else {
            info!("controller {}: no source with key {key}…", controller.id());
            if let Err(e) = controller.sink().close(CloseStatus::no_such_source()).await {
                debug!("controller {}: rejection not sent: {e}", controller.id());
            }
            return Ok(FrameOutcome::Rejected);
        };

        if let Err(e) = controller.configure(identity_key, source.id()) {
            debug!("{e}");
            return Ok(FrameOutcome::Dropped);
        }
        match source.controllers() {
            Some(directory) => {
                directory.insert(Arc::clone(controller));
            }
            None => warn!("source {} matched a key but has no directory", source.id()),
        }
        info!(
            "controller {} paired with source {} (key {key}…)",
            controller.id(),
            source.id()
        );
        Ok(FrameOutcome::Configured)
    }
}

/// The first eight characters of an identity key, for log lines.
pub fn key_prefix(key: &str) -> &str {
    key.char_indices().nth(8).map_or(key, |(i, _)| &key[..i])
}

// ── Tests ─────────────────────────────────────────────────────────────────────
