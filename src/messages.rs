//! Wire message types for the risk-event link.
//!
//! Every message on the wire is one UTF-8 JSON object terminated by a single
//! `\n`. The field names and values here are the compatibility contract with
//! the monitoring server; readers buffer and split on newline.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::prelude::*;

/// Severity tier of a computed bird-strike risk.
///
/// Tiers are ordered so escalation logic can compare them; the wire format
/// carries the symbolic name.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Normal,
    Low,
    Caution,
    High,
    Warning,
    Critical,
}

impl RiskLevel {
    /// Get display string for the level (matches the wire name).
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Normal => "NORMAL",
            RiskLevel::Low => "LOW",
            RiskLevel::Caution => "CAUTION",
            RiskLevel::High => "HIGH",
            RiskLevel::Warning => "WARNING",
            RiskLevel::Critical => "CRITICAL",
        }
    }

    /// Check if this level is above the baseline.
    pub fn is_elevated(&self) -> bool {
        *self > RiskLevel::Normal
    }
}

/// Link status carried by a `connection` message.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

/// A message on the risk-event wire.
///
/// Tagged by the `type` field; all variants carry a `timestamp` in seconds
/// since the Unix epoch.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
#[serde(rename_all = "lowercase")]
pub enum Message {
    /// A risk state transition reported by the risk-computation process.
    Event {
        /// Event name (e.g. "BR_CHANGED")
        event: String,
        /// Severity tier the computation settled on
        result: RiskLevel,
        timestamp: f64,
        /// Distance to the flock in meters
        distance: f64,
        /// Relative speed in m/s, negative when closing
        relative_speed: f64,
        /// Time-to-collision in seconds; absent when there is no closing
        /// trajectory (JSON cannot carry Infinity)
        #[serde(skip_serializing_if = "Option::is_none")]
        ttc: Option<f64>,
        /// Unbounded risk score, higher = riskier
        risk_score: f64,
    },
    /// Periodic liveness signal, independent of event traffic.
    Heartbeat { timestamp: f64, status: String },
    /// Link lifecycle notification.
    Connection {
        status: ConnectionStatus,
        timestamp: f64,
    },
}

impl Message {
    /// Build a heartbeat message stamped with the current wall-clock time.
    pub fn heartbeat() -> Self {
        Message::Heartbeat {
            timestamp: unix_timestamp(),
            status: "alive".to_string(),
        }
    }

    /// Build a connection-status message stamped with the current wall-clock time.
    pub fn connection(status: ConnectionStatus) -> Self {
        Message::Connection {
            status,
            timestamp: unix_timestamp(),
        }
    }

    /// Serialize to a single newline-terminated JSON line.
    pub fn to_json_line(&self) -> Result<String> {
        let mut line =
            serde_json::to_string(self).map_err(|e| Error::JsonParse(e.to_string()))?;
        line.push('\n');
        Ok(line)
    }

    /// Parse one wire line back into a message.
    pub fn parse_line(line: &str) -> Result<Self> {
        serde_json::from_str(line.trim_end()).map_err(|e| Error::JsonParse(e.to_string()))
    }
}

/// Current wall-clock time in seconds since the Unix epoch.
pub fn unix_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_ordering() {
        assert!(RiskLevel::Normal < RiskLevel::Low);
        assert!(RiskLevel::Low < RiskLevel::Caution);
        assert!(RiskLevel::Caution < RiskLevel::High);
        assert!(RiskLevel::High < RiskLevel::Warning);
        assert!(RiskLevel::Warning < RiskLevel::Critical);
    }

    #[test]
    fn test_risk_level_elevated() {
        assert!(!RiskLevel::Normal.is_elevated());
        assert!(RiskLevel::Low.is_elevated());
        assert!(RiskLevel::Critical.is_elevated());
    }

    #[test]
    fn test_risk_level_wire_names() {
        let json = serde_json::to_string(&RiskLevel::Caution).unwrap();
        assert_eq!(json, "\"CAUTION\"");

        let parsed: RiskLevel = serde_json::from_str("\"WARNING\"").unwrap();
        assert_eq!(parsed, RiskLevel::Warning);
        assert_eq!(parsed.as_str(), "WARNING");
    }

    #[test]
    fn test_event_wire_format() {
        let msg = Message::Event {
            event: "BR_CHANGED".to_string(),
            result: RiskLevel::High,
            timestamp: 1700000000.5,
            distance: 150.5,
            relative_speed: -12.0,
            ttc: Some(12.5),
            risk_score: 88.0,
        };
        let line = msg.to_json_line().unwrap();
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);

        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["type"], "event");
        assert_eq!(value["event"], "BR_CHANGED");
        assert_eq!(value["result"], "HIGH");
        assert_eq!(value["distance"], 150.5);
        assert_eq!(value["relative_speed"], -12.0);
        assert_eq!(value["ttc"], 12.5);
        assert_eq!(value["risk_score"], 88.0);
    }

    #[test]
    fn test_event_omits_absent_ttc() {
        let msg = Message::Event {
            event: "BR_CHANGED".to_string(),
            result: RiskLevel::Normal,
            timestamp: 1700000000.0,
            distance: 900.0,
            relative_speed: 4.0,
            ttc: None,
            risk_score: 0.0,
        };
        let value: serde_json::Value =
            serde_json::from_str(&msg.to_json_line().unwrap()).unwrap();
        assert!(value.get("ttc").is_none());
    }

    #[test]
    fn test_heartbeat_wire_format() {
        let value: serde_json::Value =
            serde_json::from_str(&Message::heartbeat().to_json_line().unwrap()).unwrap();
        assert_eq!(value["type"], "heartbeat");
        assert_eq!(value["status"], "alive");
        assert!(value["timestamp"].as_f64().unwrap() > 0.0);
    }

    #[test]
    fn test_connection_wire_format() {
        let value: serde_json::Value = serde_json::from_str(
            &Message::connection(ConnectionStatus::Connected)
                .to_json_line()
                .unwrap(),
        )
        .unwrap();
        assert_eq!(value["type"], "connection");
        assert_eq!(value["status"], "connected");

        let value: serde_json::Value = serde_json::from_str(
            &Message::connection(ConnectionStatus::Disconnected)
                .to_json_line()
                .unwrap(),
        )
        .unwrap();
        assert_eq!(value["status"], "disconnected");
    }

    #[test]
    fn test_parse_line_round_trip() {
        let msg = Message::Event {
            event: "BR_CHANGED".to_string(),
            result: RiskLevel::Critical,
            timestamp: 1700000123.25,
            distance: 42.0,
            relative_speed: -30.0,
            ttc: Some(1.4),
            risk_score: 193.2,
        };
        let parsed = Message::parse_line(&msg.to_json_line().unwrap()).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn test_parse_line_rejects_garbage() {
        assert!(Message::parse_line("not json\n").is_err());
        assert!(Message::parse_line("{\"type\":\"unknown\"}\n").is_err());
    }
}
