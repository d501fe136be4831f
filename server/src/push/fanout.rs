use std::sync::Arc;

use tokio::task::JoinSet;

use crate::alerts::model::Alert;
use crate::push::store::{PushStore, PushSubscription};
use crate::push::transport::{NotificationPayload, PushError, PushTransport};

/// Outcome counts for one fan-out. `removed` counts endpoints retired
/// after a confirmed-permanent failure; `failed` counts retriable ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutSummary {
    pub delivered: usize,
    pub removed: usize,
    pub failed: usize,
}

/// Delivers a push payload for one alert to every live subscription,
/// retiring dead endpoints as it goes.
#[derive(Clone)]
pub struct PushFanout {
    store: PushStore,
    transport: Arc<dyn PushTransport>,
}

impl PushFanout {
    pub fn new(store: PushStore, transport: Arc<dyn PushTransport>) -> Self {
        Self { store, transport }
    }

    /// Attempt one delivery per subscription, all independent and
    /// concurrent. A failure on one subscription never blocks or fails
    /// delivery to any other, and never raises to the caller.
    pub async fn deliver(&self, alert: &Alert, subscriptions: Vec<PushSubscription>) -> FanoutSummary {
        let mut summary = FanoutSummary::default();
        if subscriptions.is_empty() {
            return summary;
        }

        let payload = Arc::new(NotificationPayload::from_alert(alert));

        let mut attempts = JoinSet::new();
        for subscription in subscriptions {
            let transport = self.transport.clone();
            let payload = payload.clone();
            attempts.spawn(async move {
                let outcome = transport.send(&subscription, &payload).await;
                (subscription.endpoint, outcome)
            });
        }

        while let Some(joined) = attempts.join_next().await {
            let Ok((endpoint, outcome)) = joined else {
                // A panicked attempt is isolated like any other failure.
                summary.failed += 1;
                continue;
            };
            match outcome {
                Ok(()) => summary.delivered += 1,
                Err(PushError::Gone) => {
                    tracing::info!(endpoint = %endpoint, "Retiring expired push subscription");
                    let store = self.store.clone();
                    let target = endpoint.clone();
                    let removal =
                        tokio::task::spawn_blocking(move || store.remove(&target)).await;
                    match removal {
                        Ok(Ok(())) => summary.removed += 1,
                        _ => {
                            tracing::warn!(endpoint = %endpoint, "Failed to retire subscription");
                            summary.failed += 1;
                        }
                    }
                }
                Err(PushError::Retriable(reason)) => {
                    tracing::warn!(
                        endpoint = %endpoint,
                        reason = %reason,
                        "Push delivery failed (retriable)"
                    );
                    summary.failed += 1;
                }
            }
        }

        summary
    }
}
