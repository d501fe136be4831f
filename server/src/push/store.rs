use chrono::Utc;
use rusqlite::params;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::DbPool;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("database lock poisoned")]
    LockPoisoned,
}

/// Encryption key pair supplied by the browser's push subscription.
/// Opaque to this subsystem; handed through to the push transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

/// One registered push endpoint. A user may own many (multi-device); an
/// endpoint belongs to exactly one user at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushSubscription {
    pub endpoint: String,
    pub user_id: String,
    pub keys: SubscriptionKeys,
    pub user_agent: Option<String>,
    pub device_info: Option<String>,
    pub created_at: String,
}

/// Durable table of per-user, per-device push endpoints.
#[derive(Clone)]
pub struct PushStore {
    db: DbPool,
}

impl PushStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, rusqlite::Connection>, StoreError> {
        self.db.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Upsert keyed by endpoint. Re-registering an endpoint replaces its
    /// keys, metadata, owner, and creation time: latest registration wins,
    /// so key rotation never produces duplicate rows and `created_at`
    /// always reflects the most recent subscribe call.
    pub fn register(
        &self,
        user_id: &str,
        endpoint: &str,
        keys: &SubscriptionKeys,
        user_agent: Option<&str>,
        device_info: Option<&str>,
    ) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO push_subscriptions
                 (endpoint, user_id, p256dh, auth, user_agent, device_info, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(endpoint) DO UPDATE SET
                 user_id = excluded.user_id,
                 p256dh = excluded.p256dh,
                 auth = excluded.auth,
                 user_agent = excluded.user_agent,
                 device_info = excluded.device_info,
                 created_at = excluded.created_at",
            params![
                endpoint,
                user_id,
                keys.p256dh,
                keys.auth,
                user_agent,
                device_info,
                now
            ],
        )?;
        Ok(())
    }

    /// Explicit unsubscribe. Returns true if a record existed.
    pub fn unregister(&self, endpoint: &str) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "DELETE FROM push_subscriptions WHERE endpoint = ?1",
            [endpoint],
        )?;
        Ok(rows > 0)
    }

    /// Retire a dead endpoint (fan-out path). Idempotent.
    pub fn remove(&self, endpoint: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM push_subscriptions WHERE endpoint = ?1",
            [endpoint],
        )?;
        Ok(())
    }

    /// All subscriptions owned by one user, unordered.
    pub fn list_for_user(&self, user_id: &str) -> Result<Vec<PushSubscription>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT endpoint, user_id, p256dh, auth, user_agent, device_info, created_at
             FROM push_subscriptions WHERE user_id = ?1",
        )?;
        let rows = stmt.query_map([user_id], row_to_subscription)?;
        Ok(collect_readable(rows))
    }

    /// Every registered subscription. In the single-tenant model all
    /// admins share the alert feed, so this is the fan-out audience.
    pub fn list_all(&self) -> Result<Vec<PushSubscription>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT endpoint, user_id, p256dh, auth, user_agent, device_info, created_at
             FROM push_subscriptions",
        )?;
        let rows = stmt.query_map([], row_to_subscription)?;
        Ok(collect_readable(rows))
    }
}

/// Rows that fail to map are logged and skipped so one corrupt row cannot
/// empty the fan-out audience.
fn collect_readable(
    rows: impl Iterator<Item = rusqlite::Result<PushSubscription>>,
) -> Vec<PushSubscription> {
    let mut subscriptions = Vec::new();
    for row in rows {
        match row {
            Ok(subscription) => subscriptions.push(subscription),
            Err(e) => tracing::warn!(error = %e, "Skipping unreadable subscription row"),
        }
    }
    subscriptions
}

fn row_to_subscription(row: &rusqlite::Row<'_>) -> rusqlite::Result<PushSubscription> {
    Ok(PushSubscription {
        endpoint: row.get(0)?,
        user_id: row.get(1)?,
        keys: SubscriptionKeys {
            p256dh: row.get(2)?,
            auth: row.get(3)?,
        },
        user_agent: row.get(4)?,
        device_info: row.get(5)?,
        created_at: row.get(6)?,
    })
}
