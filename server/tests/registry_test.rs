//! Integration tests for the connection registry: admission auth,
//! idempotent leave, and broadcast failure isolation.

use std::sync::Arc;

use axum::extract::ws::Message;
use tokio::sync::mpsc;

use homeguard_server::alerts::model::{Alert, AlertPayload};
use homeguard_server::auth::{AuthError, Authenticator, JwtAuthenticator};
use homeguard_server::ws::protocol::ChannelEvent;
use homeguard_server::ws::registry::{ChannelRegistry, JoinError, CHANNEL_ALERTS, CHANNEL_DEVICES};

/// Test authenticator that admits any token as a fixed identity.
struct AllowAll;

impl Authenticator for AllowAll {
    fn authenticate(&self, _token: &str) -> Result<String, AuthError> {
        Ok("tester@example.com".to_string())
    }
}

fn registry() -> ChannelRegistry {
    ChannelRegistry::new(Arc::new(AllowAll))
}

fn sample_event(id: &str) -> ChannelEvent {
    let alert: Alert = serde_json::from_str(&format!(
        r#"{{"alert_id": "{id}", "device_ip": "10.0.0.5", "severity": "high",
            "reason": "port scan detected", "timestamp": 1700000000}}"#
    ))
    .unwrap();
    ChannelEvent::NewAlert(AlertPayload::from(&alert))
}

#[tokio::test]
async fn join_with_invalid_token_is_rejected_before_registration() {
    let registry = ChannelRegistry::new(Arc::new(JwtAuthenticator::new(vec![7u8; 32])));
    let (tx, _rx) = mpsc::unbounded_channel::<Message>();

    let result = registry.join(CHANNEL_ALERTS, "not-a-jwt", tx);
    assert!(matches!(
        result,
        Err(JoinError::AuthRejected(AuthError::Invalid))
    ));
    assert_eq!(registry.count(CHANNEL_ALERTS), 0);
}

#[tokio::test]
async fn leave_is_idempotent() {
    let registry = registry();
    let (tx, _rx) = mpsc::unbounded_channel::<Message>();
    let id = registry.join(CHANNEL_ALERTS, "token", tx).unwrap();
    assert_eq!(registry.count(CHANNEL_ALERTS), 1);

    registry.leave(id);
    assert_eq!(registry.count(CHANNEL_ALERTS), 0);

    // Removing an already-removed connection is a no-op, never an error.
    registry.leave(id);
    assert_eq!(registry.count(CHANNEL_ALERTS), 0);
}

#[tokio::test]
async fn broadcast_survives_one_dead_connection() {
    let registry = registry();

    let (tx1, mut rx1) = mpsc::unbounded_channel::<Message>();
    let (tx2, rx2) = mpsc::unbounded_channel::<Message>();
    let (tx3, mut rx3) = mpsc::unbounded_channel::<Message>();

    registry.join(CHANNEL_ALERTS, "t1", tx1).unwrap();
    registry.join(CHANNEL_ALERTS, "t2", tx2).unwrap();
    registry.join(CHANNEL_ALERTS, "t3", tx3).unwrap();

    // Connection 2's receiver is gone: its send handle now fails.
    drop(rx2);

    let delivered = registry.broadcast(CHANNEL_ALERTS, &sample_event("a1"));
    assert_eq!(delivered, 2);

    // The dead connection was evicted, the healthy ones stayed.
    assert_eq!(registry.count(CHANNEL_ALERTS), 2);
    assert!(rx1.try_recv().is_ok());
    assert!(rx3.try_recv().is_ok());
}

#[tokio::test]
async fn broadcast_is_fifo_per_connection() {
    let registry = registry();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    registry.join(CHANNEL_ALERTS, "t1", tx).unwrap();

    registry.broadcast(CHANNEL_ALERTS, &sample_event("a1"));
    registry.broadcast(CHANNEL_ALERTS, &sample_event("a2"));

    let first = rx.try_recv().unwrap();
    let second = rx.try_recv().unwrap();
    let decode = |msg: Message| -> ChannelEvent {
        match msg {
            Message::Text(text) => serde_json::from_str(&text).unwrap(),
            other => panic!("expected text frame, got {other:?}"),
        }
    };
    assert_eq!(decode(first), sample_event("a1"));
    assert_eq!(decode(second), sample_event("a2"));
}

#[tokio::test]
async fn channels_are_isolated_from_each_other() {
    let registry = registry();
    let (alerts_tx, mut alerts_rx) = mpsc::unbounded_channel::<Message>();
    let (devices_tx, mut devices_rx) = mpsc::unbounded_channel::<Message>();
    registry.join(CHANNEL_ALERTS, "t1", alerts_tx).unwrap();
    registry.join(CHANNEL_DEVICES, "t2", devices_tx).unwrap();

    let delivered = registry.broadcast(CHANNEL_ALERTS, &sample_event("a1"));
    assert_eq!(delivered, 1);
    assert!(alerts_rx.try_recv().is_ok());
    assert!(devices_rx.try_recv().is_err());
}
