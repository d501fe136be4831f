use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

use crate::alerts::feed::{self, FeedError};
use crate::alerts::model::Alert;

/// Upper bound on the deduplication memory. Eviction is oldest-insertion
/// first and only kicks in past this bound, which far exceeds plausible
/// alert volume between process restarts.
pub const SEEN_SET_CAPACITY: usize = 65_536;

/// Deduplication memory for alert identifiers: set membership plus
/// insertion order for bounded eviction.
pub struct SeenSet {
    ids: HashSet<String>,
    order: VecDeque<String>,
    capacity: usize,
}

impl SeenSet {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ids: HashSet::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    /// Record an identifier. Returns true if it was previously unseen.
    pub fn insert(&mut self, id: &str) -> bool {
        if self.ids.contains(id) {
            return false;
        }
        if self.ids.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
        self.ids.insert(id.to_string());
        self.order.push_back(id.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Watches the append-only alert feed and emits each previously-unseen
/// alert exactly once, in feed order, to its downstream consumer.
pub struct AlertWatcher {
    feed_path: PathBuf,
    poll_interval: Duration,
    seen: SeenSet,
    tx: mpsc::UnboundedSender<Alert>,
}

impl AlertWatcher {
    pub fn new(
        feed_path: PathBuf,
        poll_interval: Duration,
        tx: mpsc::UnboundedSender<Alert>,
    ) -> Self {
        Self {
            feed_path,
            poll_interval,
            seen: SeenSet::with_capacity(SEEN_SET_CAPACITY),
            tx,
        }
    }

    /// Mark every alert currently in the feed as seen without emitting.
    /// Called at startup so a process restart does not re-notify for
    /// history already in the feed. Read failures are tolerated; the feed
    /// may simply not exist yet.
    pub fn prime(&mut self) {
        match feed::read_feed(&self.feed_path) {
            Ok(alerts) => {
                for alert in &alerts {
                    self.seen.insert(&alert.alert_id);
                }
                tracing::info!(
                    known = self.seen.len(),
                    "Primed seen-set from existing feed contents"
                );
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not prime seen-set from feed");
            }
        }
    }

    /// One watcher tick: read the whole feed, emit alerts not yet seen,
    /// in feed order. Returns how many alerts were newly discovered.
    pub fn poll_feed(&mut self) -> Result<usize, FeedError> {
        let alerts = feed::read_feed(&self.feed_path)?;
        let mut discovered = 0;
        for alert in alerts {
            if self.seen.insert(&alert.alert_id) {
                discovered += 1;
                // Downstream receiver only drops at shutdown.
                let _ = self.tx.send(alert);
            }
        }
        Ok(discovered)
    }

    /// Run the fixed-interval watch loop. A failed tick is logged and
    /// skipped; the next tick retries. The feed read is file IO, so each
    /// tick shuttles the watcher through `spawn_blocking` to keep it off
    /// the runtime threads.
    pub async fn run(mut self) {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let outcome = tokio::task::spawn_blocking(move || {
                let result = self.poll_feed();
                (self, result)
            })
            .await;
            let result = match outcome {
                Ok((watcher, result)) => {
                    self = watcher;
                    result
                }
                Err(e) => {
                    tracing::error!(error = %e, "Feed watcher tick panicked, stopping");
                    return;
                }
            };
            match result {
                Ok(0) => {}
                Ok(n) => tracing::info!(count = n, "Detected new alert(s)"),
                Err(e) => tracing::warn!(error = %e, "Feed read failed, skipping tick"),
            }
        }
    }
}
