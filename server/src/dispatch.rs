use tokio::sync::mpsc;

use crate::alerts::model::{Alert, AlertPayload};
use crate::push::fanout::PushFanout;
use crate::push::store::PushStore;
use crate::ws::protocol::ChannelEvent;
use crate::ws::registry::{ChannelRegistry, CHANNEL_ALERTS};

/// Wires watcher output to the live broadcast and the push fan-out.
///
/// Alerts are handled strictly one at a time, in feed order; within one
/// alert the two delivery legs run concurrently, and both are attempted
/// exactly once regardless of the other's outcome.
pub struct Distributor {
    registry: ChannelRegistry,
    store: PushStore,
    fanout: PushFanout,
    rx: mpsc::UnboundedReceiver<Alert>,
}

impl Distributor {
    pub fn new(
        registry: ChannelRegistry,
        store: PushStore,
        fanout: PushFanout,
        rx: mpsc::UnboundedReceiver<Alert>,
    ) -> Self {
        Self {
            registry,
            store,
            fanout,
            rx,
        }
    }

    pub async fn run(mut self) {
        while let Some(alert) = self.rx.recv().await {
            self.dispatch(&alert).await;
        }
        tracing::info!("Alert distribution stopped (watcher closed)");
    }

    /// Distribute one discovered alert to both delivery paths.
    pub async fn dispatch(&self, alert: &Alert) {
        let live = async {
            let event = ChannelEvent::NewAlert(AlertPayload::from(alert));
            let delivered = self.registry.broadcast(CHANNEL_ALERTS, &event);
            tracing::info!(
                alert_id = %alert.alert_id,
                delivered,
                "Broadcast alert to live dashboards"
            );
        };

        let push = async {
            let store = self.store.clone();
            let audience = match tokio::task::spawn_blocking(move || store.list_all()).await {
                Ok(Ok(subscriptions)) => subscriptions,
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "Failed to load push audience");
                    return;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Push audience task failed");
                    return;
                }
            };
            let summary = self.fanout.deliver(alert, audience).await;
            tracing::info!(
                alert_id = %alert.alert_id,
                delivered = summary.delivered,
                removed = summary.removed,
                failed = summary.failed,
                "Push fan-out complete"
            );
        };

        // Independent side effects; neither leg's failure suppresses the
        // other, and both finish before the next alert is taken.
        tokio::join!(live, push);
    }
}
