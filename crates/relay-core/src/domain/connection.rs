//! The two kinds of live connection and their one-shot configuration slots.
//!
//! A connection starts *unconfigured*.  Its first text frame is the
//! handshake, which fills the configuration slot exactly once.  After that,
//! many sessions may read the configuration concurrently (a source's
//! broadcast reads its own directory while controllers pair into it), so the
//! slot is a [`OnceLock`]: one writer, any number of readers, and readers
//! either see nothing or the complete value.

use std::fmt;
use std::sync::{Arc, OnceLock};

use thiserror::Error;
use uuid::Uuid;

use crate::domain::pairing::PairingDirectory;
use crate::domain::session::SessionSink;

/// Process-unique identifier of a live connection.
pub type ConnectionId = Uuid;

/// Which endpoint a connection arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// The fixed sensing unit publishing status frames.
    Source,
    /// A remote app subscribed to one source.
    Controller,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Source => "source",
            Role::Controller => "controller",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a handshake arrives for a connection that already has one.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("connection {0} is already configured")]
pub struct AlreadyConfigured(pub ConnectionId);

/// Capabilities shared by both connection variants.
///
/// [`crate::ConnectionRegistry`] is generic over this trait so the same
/// registry code serves both endpoints.
pub trait Connection: Send + Sync + 'static {
    /// The endpoint this variant belongs to.
    const ROLE: Role;

    fn id(&self) -> ConnectionId;

    /// The outbound half of this connection's session.
    fn sink(&self) -> &Arc<dyn SessionSink>;

    /// `true` once the handshake has been applied.
    fn is_configured(&self) -> bool;
}

// ── Telemetry source ──────────────────────────────────────────────────────────

/// Configuration bound by a source's handshake.
pub struct SourceConfig {
    /// The key controllers must present to pair with this source.
    pub identity_key: String,
    /// Controllers currently subscribed to this source's broadcasts.
    pub controllers: PairingDirectory,
}

impl SourceConfig {
    fn new(identity_key: String) -> Self {
        Self {
            identity_key,
            controllers: PairingDirectory::new(),
        }
    }
}

/// A live session on the telemetry-source endpoint.
pub struct SourceConnection {
    id: ConnectionId,
    sink: Arc<dyn SessionSink>,
    config: OnceLock<SourceConfig>,
}

impl SourceConnection {
    pub fn new(id: ConnectionId, sink: Arc<dyn SessionSink>) -> Self {
        Self {
            id,
            sink,
            config: OnceLock::new(),
        }
    }

    /// The handshake configuration, or `None` before the handshake.
    pub fn config(&self) -> Option<&SourceConfig> {
        self.config.get()
    }

    /// Binds `identity_key` to this source with an empty pairing directory.
    ///
    /// # Errors
    ///
    /// Returns [`AlreadyConfigured`] if a handshake was already applied; the
    /// existing configuration is left untouched.
    pub fn configure(&self, identity_key: String) -> Result<(), AlreadyConfigured> {
        self.config
            .set(SourceConfig::new(identity_key))
            .map_err(|_| AlreadyConfigured(self.id))
    }

    /// `true` if this source is configured with exactly `identity_key`.
    pub fn has_identity_key(&self, identity_key: &str) -> bool {
        self.config()
            .is_some_and(|cfg| cfg.identity_key == identity_key)
    }

    /// The source's pairing directory, once configured.
    pub fn controllers(&self) -> Option<&PairingDirectory> {
        self.config().map(|cfg| &cfg.controllers)
    }
}

impl Connection for SourceConnection {
    const ROLE: Role = Role::Source;

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn sink(&self) -> &Arc<dyn SessionSink> {
        &self.sink
    }

    fn is_configured(&self) -> bool {
        self.config.get().is_some()
    }
}

impl fmt::Debug for SourceConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConnection")
            .field("id", &self.id)
            .field("configured", &self.is_configured())
            .field(
                "controllers",
                &self.controllers().map(PairingDirectory::len).unwrap_or(0),
            )
            .finish()
    }
}

// ── Controller ────────────────────────────────────────────────────────────────

/// Configuration bound by a controller's successful handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// The key the controller asked for.
    pub identity_key: String,
    /// The source this controller is paired with.  Never changes afterwards,
    /// even if that source disconnects.
    pub paired_source: ConnectionId,
}

/// A live session on the controller endpoint.
pub struct ControllerConnection {
    id: ConnectionId,
    sink: Arc<dyn SessionSink>,
    config: OnceLock<ControllerConfig>,
}

impl ControllerConnection {
    pub fn new(id: ConnectionId, sink: Arc<dyn SessionSink>) -> Self {
        Self {
            id,
            sink,
            config: OnceLock::new(),
        }
    }

    pub fn config(&self) -> Option<&ControllerConfig> {
        self.config.get()
    }

    /// Records the pairing with `paired_source`.
    ///
    /// # Errors
    ///
    /// Returns [`AlreadyConfigured`] if the controller is already paired.
    pub fn configure(
        &self,
        identity_key: String,
        paired_source: ConnectionId,
    ) -> Result<(), AlreadyConfigured> {
        self.config
            .set(ControllerConfig {
                identity_key,
                paired_source,
            })
            .map_err(|_| AlreadyConfigured(self.id))
    }

    /// The source this controller is paired with, if any.
    pub fn paired_source(&self) -> Option<ConnectionId> {
        self.config().map(|cfg| cfg.paired_source)
    }
}

impl Connection for ControllerConnection {
    const ROLE: Role = Role::Controller;

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn sink(&self) -> &Arc<dyn SessionSink> {
        &self.sink
    }

    fn is_configured(&self) -> bool {
        self.config.get().is_some()
    }
}

impl fmt::Debug for ControllerConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerConnection")
            .field("id", &self.id)
            .field("paired_source", &self.paired_source())
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::session::SinkError;
    use crate::protocol::close::CloseStatus;
    use async_trait::async_trait;

    struct NullSink;

    #[async_trait]
    impl SessionSink for NullSink {
        async fn send_text(&self, _text: &str) -> Result<(), SinkError> {
            Ok(())
        }
        async fn close(&self, _status: CloseStatus) -> Result<(), SinkError> {
            Ok(())
        }
        fn is_active(&self) -> bool {
            true
        }
    }

    fn sink() -> Arc<dyn SessionSink> {
        Arc::new(NullSink)
    }

    #[test]
    fn test_source_starts_unconfigured() {
        let source = SourceConnection::new(Uuid::new_v4(), sink());
        assert!(!source.is_configured());
        assert!(source.config().is_none());
        assert!(source.controllers().is_none());
    }

    #[test]
    fn test_source_configure_sets_key_and_empty_directory() {
        // Arrange
        let source = SourceConnection::new(Uuid::new_v4(), sink());

        // Act
        source.configure("unit-1".to_string()).unwrap();

        // Assert
        let cfg = source.config().unwrap();
        assert_eq!(cfg.identity_key, "unit-1");
        assert!(cfg.controllers.is_empty());
        assert!(source.has_identity_key("unit-1"));
        assert!(!source.has_identity_key("unit-2"));
    }

    #[test]
    fn test_source_second_configure_is_rejected_and_keeps_first_key() {
        let id = Uuid::new_v4();
        let source = SourceConnection::new(id, sink());
        source.configure("first".to_string()).unwrap();

        let result = source.configure("second".to_string());

        assert_eq!(result, Err(AlreadyConfigured(id)));
        assert!(source.has_identity_key("first"));
    }

    #[test]
    fn test_unconfigured_source_matches_no_key() {
        let source = SourceConnection::new(Uuid::new_v4(), sink());
        assert!(!source.has_identity_key(""));
    }

    #[test]
    fn test_controller_configure_records_paired_source() {
        let controller = ControllerConnection::new(Uuid::new_v4(), sink());
        let source_id = Uuid::new_v4();

        controller.configure("unit-1".to_string(), source_id).unwrap();

        assert!(controller.is_configured());
        assert_eq!(controller.paired_source(), Some(source_id));
        assert_eq!(controller.config().unwrap().identity_key, "unit-1");
    }

    #[test]
    fn test_controller_pairing_never_changes() {
        let controller = ControllerConnection::new(Uuid::new_v4(), sink());
        let first = Uuid::new_v4();
        controller.configure("k".to_string(), first).unwrap();

        assert!(controller.configure("k".to_string(), Uuid::new_v4()).is_err());
        assert_eq!(controller.paired_source(), Some(first));
    }

    #[test]
    fn test_role_display_names() {
        assert_eq!(Role::Source.to_string(), "source");
        assert_eq!(Role::Controller.to_string(), "controller");
        assert_eq!(SourceConnection::ROLE, Role::Source);
        assert_eq!(ControllerConnection::ROLE, Role::Controller);
    }
}
