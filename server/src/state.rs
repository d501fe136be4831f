use crate::db::DbPool;
use crate::push::store::PushStore;
use crate::ws::registry::ChannelRegistry;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection wrapped in Arc<Mutex>
    pub db: DbPool,
    /// JWT signing secret (256-bit random key)
    pub jwt_secret: Vec<u8>,
    /// Live, channel-scoped WebSocket connections
    pub registry: ChannelRegistry,
    /// Durable push subscription store
    pub push_store: PushStore,
}
