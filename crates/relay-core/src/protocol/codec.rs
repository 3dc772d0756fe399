//! JSON decoders for the relay protocol.
//!
//! The relay decodes frames only to validate them.  Two policies apply:
//!
//! - **Handshakes are strict.**  [`Handshake`] rejects unknown fields, and the
//!   caller treats any error as fatal to the session.
//! - **Steady-state frames are lenient.**  [`StatusReport`] and
//!   [`ThresholdUpdate`] ignore unknown fields so newer firmware or apps can
//!   add data without breaking older relays.  The caller drops frames that
//!   still fail (missing field, wrong type, not an object) and keeps going.

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::protocol::messages::{Handshake, StatusReport, ThresholdUpdate};

/// Errors that can occur while decoding a frame body.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The text is not valid JSON for the expected schema.
    #[error("malformed {kind}: {reason}")]
    Malformed {
        /// Which schema was expected (`"handshake"`, `"status report"`, ...).
        kind: &'static str,
        /// The underlying parser message, including line and column.
        reason: String,
    },
}

impl ProtocolError {
    /// The schema the failing frame was checked against.
    pub fn kind(&self) -> &'static str {
        match self {
            ProtocolError::Malformed { kind, .. } => kind,
        }
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Decodes the first frame of a session.
///
/// # Errors
///
/// Returns [`ProtocolError::Malformed`] for invalid JSON, a missing or
/// mistyped `public_key`, or any extra field.
///
/// # Examples
///
/// ```rust
/// use relay_core::protocol::decode_handshake;
///
/// let hs = decode_handshake(r#"{"public_key":"k1"}"#).unwrap();
/// assert_eq!(hs.public_key, "k1");
/// assert!(decode_handshake(r#"{"public_key":"k1","extra":1}"#).is_err());
/// ```
pub fn decode_handshake(text: &str) -> Result<Handshake, ProtocolError> {
    decode(text, "handshake")
}

/// Decodes a steady-state frame from a telemetry source.
///
/// # Errors
///
/// Returns [`ProtocolError::Malformed`] if a required field is missing or has
/// the wrong type.  Unknown fields are ignored.
pub fn decode_status_report(text: &str) -> Result<StatusReport, ProtocolError> {
    decode(text, "status report")
}

/// Decodes a steady-state frame from a controller.
///
/// # Errors
///
/// Returns [`ProtocolError::Malformed`] if a required field is missing or has
/// the wrong type.  Unknown fields are ignored.
pub fn decode_threshold_update(text: &str) -> Result<ThresholdUpdate, ProtocolError> {
    decode(text, "threshold update")
}

fn decode<T: DeserializeOwned>(text: &str, kind: &'static str) -> Result<T, ProtocolError> {
    serde_json::from_str(text).map_err(|e| ProtocolError::Malformed {
        kind,
        reason: e.to_string(),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
