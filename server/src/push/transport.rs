use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::alerts::model::{Alert, Severity};
use crate::push::store::PushSubscription;

/// Classified delivery failure for one (alert, subscription) attempt.
#[derive(Debug, Error)]
pub enum PushError {
    /// The push service confirmed the subscription is permanently gone.
    /// The fan-out retires the endpoint in response.
    #[error("subscription gone")]
    Gone,
    /// Anything else: network error, timeout, transient server failure.
    /// Logged, not retried within the delivering call.
    #[error("push delivery failed: {0}")]
    Retriable(String),
}

/// Notification payload delivered to each device. `tag` equals the alert
/// identifier so the push provider can collapse repeated pushes for the
/// same alert on one endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    pub severity: Severity,
    pub url: String,
    pub tag: String,
}

impl NotificationPayload {
    pub fn from_alert(alert: &Alert) -> Self {
        Self {
            title: format!("Security Alert: {} severity", alert.severity),
            body: format!("{} ({})", alert.reason, alert.device_ip),
            severity: alert.severity,
            url: format!("/alerts?id={}", alert.alert_id),
            tag: alert.alert_id.clone(),
        }
    }
}

/// Push transport collaborator: one delivery attempt per call, classified
/// as delivered / retriable / permanently gone. Timeouts are the
/// transport's responsibility and surface as retriable failures.
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn send(
        &self,
        subscription: &PushSubscription,
        payload: &NotificationPayload,
    ) -> Result<(), PushError>;
}

/// HTTP push transport: posts the payload to the subscription endpoint.
/// 404/410 from the push service mean the subscription no longer exists;
/// every other failure is treated as retriable.
pub struct HttpPushTransport {
    client: reqwest::Client,
}

impl HttpPushTransport {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PushTransport for HttpPushTransport {
    async fn send(
        &self,
        subscription: &PushSubscription,
        payload: &NotificationPayload,
    ) -> Result<(), PushError> {
        let response = self
            .client
            .post(&subscription.endpoint)
            .header("TTL", "86400")
            .json(payload)
            .send()
            .await
            .map_err(|e| PushError::Retriable(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND | StatusCode::GONE => Err(PushError::Gone),
            status => Err(PushError::Retriable(format!(
                "push service returned {status}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_tag_is_the_alert_id() {
        let alert: Alert = serde_json::from_str(
            r#"{"alert_id": "a1", "device_ip": "10.0.0.5", "severity": "high",
                "reason": "port scan detected", "timestamp": 1700000000}"#,
        )
        .unwrap();
        let payload = NotificationPayload::from_alert(&alert);
        assert_eq!(payload.tag, "a1");
        assert_eq!(payload.url, "/alerts?id=a1");
        assert!(payload.title.contains("high"));
        assert!(payload.body.contains("10.0.0.5"));
    }
}
