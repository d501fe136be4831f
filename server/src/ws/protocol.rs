use serde::{Deserialize, Serialize};

use crate::alerts::model::AlertPayload;

/// Full device record snapshot carried on the "devices" channel, as the
/// network monitor writes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    pub ip: String,
    pub mac: String,
    #[serde(default)]
    pub name: Option<String>,
    pub status: String,
    #[serde(default)]
    pub interface: Option<String>,
    #[serde(default)]
    pub last_seen: Option<f64>,
}

/// Typed envelope for server-to-client channel events. On the wire:
/// `{"type": "new_alert", "data": {...}}` / `{"type": "device_update",
/// "data": {...}}`. Unknown type tags fail to decode on the client and
/// are dropped there, never crashing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ChannelEvent {
    NewAlert(AlertPayload),
    DeviceUpdate(DeviceSnapshot),
}
