use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use thiserror::Error;
use uuid::Uuid;

use crate::auth::{AuthError, Authenticator};
use crate::ws::protocol::ChannelEvent;
use crate::ws::ConnectionSender;

/// Broadcast domains, created at process start for the process lifetime.
pub const CHANNEL_ALERTS: &str = "alerts";
pub const CHANNEL_DEVICES: &str = "devices";

/// Handle for one registered connection, returned by `join`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

/// One authenticated live transport session. Owned exclusively by the
/// registry; destroyed on transport close or send failure.
struct Connection {
    sender: ConnectionSender,
    identity: String,
    #[allow(dead_code)]
    connected_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum JoinError {
    /// Admission denied by the authentication collaborator. Fatal to this
    /// connection attempt only.
    #[error("connection rejected: {0}")]
    AuthRejected(#[from] AuthError),
}

/// Tracks live, authenticated, channel-scoped connections. The registry
/// is the sole mutator of channel membership; membership mutation and the
/// broadcast snapshot are serialized per channel by the map's shard lock,
/// so a broadcast never sends to a connection mid-teardown.
#[derive(Clone)]
pub struct ChannelRegistry {
    channels: Arc<DashMap<String, HashMap<ConnectionId, Connection>>>,
    authenticator: Arc<dyn Authenticator>,
}

impl ChannelRegistry {
    pub fn new(authenticator: Arc<dyn Authenticator>) -> Self {
        let channels = Arc::new(DashMap::new());
        channels.insert(CHANNEL_ALERTS.to_string(), HashMap::new());
        channels.insert(CHANNEL_DEVICES.to_string(), HashMap::new());
        Self {
            channels,
            authenticator,
        }
    }

    /// Admit a connection to a channel. The token is checked against the
    /// authentication collaborator before registration; on success the
    /// connection is a broadcast target immediately.
    pub fn join(
        &self,
        channel: &str,
        token: &str,
        sender: ConnectionSender,
    ) -> Result<ConnectionId, JoinError> {
        let identity = self.authenticator.authenticate(token)?;
        let id = ConnectionId::new();
        let connection = Connection {
            sender,
            identity: identity.clone(),
            connected_at: Utc::now(),
        };
        self.channels
            .entry(channel.to_string())
            .or_default()
            .insert(id, connection);
        tracing::debug!(channel, identity = %identity, "Connection registered");
        Ok(id)
    }

    /// Remove a connection. Idempotent: an already-removed id is a no-op.
    pub fn leave(&self, id: ConnectionId) {
        for mut entry in self.channels.iter_mut() {
            if let Some(connection) = entry.value_mut().remove(&id) {
                tracing::debug!(
                    channel = %entry.key(),
                    identity = %connection.identity,
                    "Connection unregistered"
                );
                return;
            }
        }
    }

    /// Send an event to every connection currently in the channel.
    ///
    /// Connections joining mid-broadcast wait on the channel lock and do
    /// not receive this message. A connection whose send fails is evicted
    /// and the broadcast continues with the remaining targets. Returns the
    /// count of successful deliveries.
    pub fn broadcast(&self, channel: &str, event: &ChannelEvent) -> usize {
        let text = match serde_json::to_string(event) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(channel, error = %e, "Failed to encode channel event");
                return 0;
            }
        };
        let msg = Message::Text(text.into());

        let Some(mut members) = self.channels.get_mut(channel) else {
            return 0;
        };
        let before = members.len();
        members.retain(|_, connection| connection.sender.send(msg.clone()).is_ok());
        let delivered = members.len();
        if delivered < before {
            tracing::warn!(
                channel,
                evicted = before - delivered,
                "Evicted dead connection(s) during broadcast"
            );
        }
        delivered
    }

    /// Number of live connections in a channel.
    pub fn count(&self, channel: &str) -> usize {
        self.channels.get(channel).map(|m| m.len()).unwrap_or(0)
    }

    /// Force-close every connection in a channel with the given close
    /// code, then drop them from the registry.
    pub fn close_channel(&self, channel: &str, close_code: u16, reason: &str) {
        if let Some(mut members) = self.channels.get_mut(channel) {
            for connection in members.values() {
                let frame = CloseFrame {
                    code: close_code,
                    reason: reason.to_string().into(),
                };
                let _ = connection.sender.send(Message::Close(Some(frame)));
            }
            members.clear();
        }
    }
}
