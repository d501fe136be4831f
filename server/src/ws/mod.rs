pub mod actor;
pub mod handler;
pub mod protocol;
pub mod registry;

use axum::extract::ws::Message;
use tokio::sync::mpsc;

/// Sender half of a WebSocket connection's outbound channel.
/// Other parts of the system clone this to push messages to one client.
pub type ConnectionSender = mpsc::UnboundedSender<Message>;
