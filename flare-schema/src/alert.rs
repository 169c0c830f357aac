//! Alert Types
//!
//! The central record of the pipeline. An Alert is immutable after
//! construction; enrichment produces a new value. Wire format is a flat JSON
//! object with snake_case fields and upper-case flag keys.

use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// RECOMMENDED ACTION
// ============================================================================

/// Response recommended by the classifier stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecommendedAction {
    #[serde(rename = "NO_ACTION")]
    NoAction,
    #[serde(rename = "RATE_LIMIT")]
    RateLimit,
    #[serde(rename = "DROP_FRAGMENT")]
    DropFragment,
    #[serde(rename = "STATE_FLUSH")]
    StateFlush,
}

impl RecommendedAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendedAction::NoAction => "NO_ACTION",
            RecommendedAction::RateLimit => "RATE_LIMIT",
            RecommendedAction::DropFragment => "DROP_FRAGMENT",
            RecommendedAction::StateFlush => "STATE_FLUSH",
        }
    }
}

impl std::fmt::Display for RecommendedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// TCP FLAGS
// ============================================================================

/// Fixed flag key set. Unknown keys on the wire are a schema violation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TcpFlags {
    #[serde(rename = "RST")]
    pub rst: bool,
    #[serde(rename = "FIN")]
    pub fin: bool,
    #[serde(rename = "SYN")]
    pub syn: bool,
    #[serde(rename = "FRAG")]
    pub frag: bool,
}

// ============================================================================
// ALERT
// ============================================================================

/// Structured record describing a detected suspicious traffic pattern and a
/// recommended response.
///
/// `alert_id` is generated once and never reused; `timestamp` is UTC creation
/// time. Endpoint addresses are best-effort and default to 0.0.0.0 when the
/// data plane cannot attribute the pattern to a single pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Alert {
    pub alert_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub source_ip: Ipv4Addr,
    pub destination_ip: Ipv4Addr,
    pub protocol: String,
    pub flags: TcpFlags,
    pub classifier_confidence: f64,
    pub recommended_action: RecommendedAction,
}

impl Alert {
    /// Serialize to the wire form (UTF-8 JSON, no framing).
    pub fn to_json(&self) -> String {
        // Serialization of a struct with no map keys cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_alert() -> Alert {
        Alert {
            alert_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source_ip: Ipv4Addr::new(192, 168, 1, 101),
            destination_ip: Ipv4Addr::new(10, 0, 0, 5),
            protocol: "TCP".to_string(),
            flags: TcpFlags {
                rst: true,
                ..Default::default()
            },
            classifier_confidence: 0.95,
            recommended_action: RecommendedAction::RateLimit,
        }
    }

    #[test]
    fn test_wire_field_names() {
        let json = sample_alert().to_json();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert!(value.get("alert_id").is_some());
        assert_eq!(value["source_ip"], "192.168.1.101");
        assert_eq!(value["flags"]["RST"], true);
        assert_eq!(value["flags"]["SYN"], false);
        assert_eq!(value["recommended_action"], "RATE_LIMIT");
    }

    #[test]
    fn test_timestamp_utc_suffix() {
        let json = sample_alert().to_json();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let ts = value["timestamp"].as_str().unwrap();
        assert!(ts.ends_with('Z'), "timestamp must carry the Z suffix: {ts}");
    }

    #[test]
    fn test_action_round_trip() {
        for action in [
            RecommendedAction::NoAction,
            RecommendedAction::RateLimit,
            RecommendedAction::DropFragment,
            RecommendedAction::StateFlush,
        ] {
            let s = serde_json::to_string(&action).unwrap();
            assert_eq!(s, format!("\"{}\"", action.as_str()));
        }
    }
}
