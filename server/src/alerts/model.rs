use std::fmt;

use serde::{Deserialize, Serialize};

/// Alert severity, ordered from least to most urgent.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// One record in the append-only alert feed. Written by the external
/// detector; this subsystem only reads it. `alert_id` is the stable
/// identity the deduplication memory is keyed on. Fields the detector
/// sometimes omits fall back to the dashboard's display defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    #[serde(default)]
    pub alert_id: String,
    #[serde(default = "unknown")]
    pub device_ip: String,
    #[serde(default = "unknown")]
    pub device_mac: String,
    #[serde(default = "unknown_device")]
    pub device_name: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default = "default_reason")]
    pub reason: String,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub action_taken: Option<String>,
    #[serde(default)]
    pub acknowledged: bool,
    #[serde(default = "default_status")]
    pub status: String,
}

fn unknown() -> String {
    "unknown".to_string()
}

fn unknown_device() -> String {
    "Unknown Device".to_string()
}

fn default_reason() -> String {
    "Suspicious activity detected".to_string()
}

fn default_status() -> String {
    "active".to_string()
}

/// The `data` body of a `new_alert` envelope on the "alerts" channel.
/// Shape is part of the wire contract with dashboards and must not drift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertPayload {
    pub alert_id: String,
    pub device_ip: String,
    pub device_mac: String,
    pub device_name: String,
    pub severity: Severity,
    pub reason: String,
    pub timestamp: i64,
    pub action_taken: Option<String>,
    pub status: String,
}

impl From<&Alert> for AlertPayload {
    fn from(alert: &Alert) -> Self {
        Self {
            alert_id: alert.alert_id.clone(),
            device_ip: alert.device_ip.clone(),
            device_mac: alert.device_mac.clone(),
            device_name: alert.device_name.clone(),
            severity: alert.severity,
            reason: alert.reason.clone(),
            timestamp: alert.timestamp,
            action_taken: alert.action_taken.clone(),
            status: alert.status.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_orders_low_to_critical() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn severity_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Severity::High).unwrap(), "\"high\"");
        assert_eq!(
            serde_json::from_str::<Severity>("\"critical\"").unwrap(),
            Severity::Critical
        );
    }

    #[test]
    fn sparse_feed_record_gets_display_defaults() {
        let alert: Alert =
            serde_json::from_str(r#"{"alert_id": "a1", "timestamp": 1700000000}"#).unwrap();
        assert_eq!(alert.device_name, "Unknown Device");
        assert_eq!(alert.severity, Severity::Low);
        assert_eq!(alert.status, "active");
        assert!(!alert.acknowledged);
    }
}
