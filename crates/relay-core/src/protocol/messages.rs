//! All telemetry relay protocol message types.
//!
//! Every frame on both endpoints is a WebSocket text frame carrying a single
//! JSON object.  Which schema applies depends only on the frame's position in
//! the stream:
//!
//! | Endpoint          | First frame   | Every later frame   |
//! |-------------------|---------------|---------------------|
//! | telemetry source  | [`Handshake`] | [`StatusReport`]    |
//! | controller        | [`Handshake`] | [`ThresholdUpdate`] |
//!
//! The relay never re-encodes a steady-state frame.  These types exist so
//! the relay can *validate* a frame before forwarding the original text
//! verbatim; fields the relay does not know about survive the trip.

use serde::{Deserialize, Serialize};

// ── Handshake ─────────────────────────────────────────────────────────────────

/// The identity-binding message that opens every session.
///
/// ```json
/// {"public_key":"MCowBQYDK2VwAyEA..."}
/// ```
///
/// `deny_unknown_fields` makes the handshake strict: an extra field is a
/// schema violation, and a schema violation on the handshake ends the
/// session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Handshake {
    /// Opaque identity key.  Sources announce it; controllers ask for it.
    pub public_key: String,
}

// ── Controller → source ───────────────────────────────────────────────────────

/// Alarm thresholds a controller pushes to its paired source.
///
/// The same object is embedded in every [`StatusReport`] so controllers can
/// see the thresholds currently in effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdUpdate {
    /// Rain sensor reading above which the unit closes.
    pub rain_threshold: i32,
    /// PM2.5 level above which the unit closes.
    pub pm_25_threshold: i32,
    /// PM10 level above which the unit closes.
    pub pm_10_threshold: i32,
    /// Optional signature over the threshold values.  Absent and `null` are
    /// both accepted.
    pub signature: Option<String>,
}

// ── Source → controllers ──────────────────────────────────────────────────────

/// The network the sensing unit is currently attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiStatus {
    pub ssid: String,
    /// Signal strength as reported by the unit's network manager.
    pub strength: i32,
}

/// Periodic status frame published by a telemetry source.
///
/// ```json
/// {
///   "thresholds": {"rain_threshold":30,"pm_25_threshold":25,"pm_10_threshold":50,"signature":null},
///   "wifi": {"ssid":"home","strength":72},
///   "is_closed": false,
///   "is_raining": false,
///   "pm_25_level": 12,
///   "pm_10_level": 20
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub thresholds: ThresholdUpdate,
    pub wifi: WifiStatus,
    /// `true` when the unit's actuator is in the closed position.
    pub is_closed: bool,
    pub is_raining: bool,
    pub pm_25_level: i32,
    pub pm_10_level: i32,
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_thresholds() -> ThresholdUpdate {
        ThresholdUpdate {
            rain_threshold: 30,
            pm_25_threshold: 25,
            pm_10_threshold: 50,
            signature: None,
        }
    }

    #[test]
    fn test_handshake_serializes_with_snake_case_key() {
        let msg = Handshake {
            public_key: "abc".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"public_key":"abc"}"#);
    }

    #[test]
    fn test_threshold_update_serializes_null_signature() {
        // Arrange
        let msg = sample_thresholds();

        // Act
        let value = serde_json::to_value(&msg).unwrap();

        // Assert: the wire names match the sensing unit's field names exactly
        assert_eq!(value["rain_threshold"], 30);
        assert_eq!(value["pm_25_threshold"], 25);
        assert_eq!(value["pm_10_threshold"], 50);
        assert!(value["signature"].is_null());
    }

    #[test]
    fn test_status_report_nests_thresholds_and_wifi() {
        let report = StatusReport {
            thresholds: sample_thresholds(),
            wifi: WifiStatus {
                ssid: "home".to_string(),
                strength: -61,
            },
            is_closed: true,
            is_raining: true,
            pm_25_level: 12,
            pm_10_level: 20,
        };

        let value = serde_json::to_value(&report).unwrap();

        assert_eq!(value["thresholds"]["pm_10_threshold"], 50);
        assert_eq!(value["wifi"]["ssid"], "home");
        assert_eq!(value["wifi"]["strength"], -61);
        assert_eq!(value["is_closed"], true);
        assert_eq!(value["pm_25_level"], 12);
    }
}
