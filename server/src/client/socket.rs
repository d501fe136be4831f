use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::ws::protocol::ChannelEvent;

/// Fixed delay before a reconnect attempt after an unexpected close.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Lifecycle of one logical channel connection. `Closed` is terminal and
/// reachable only through explicit caller teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    Disconnected,
    Connecting,
    Connected,
    Closed,
}

/// Caller-supplied callback invoked for every decoded channel event.
pub type EventHandler = Arc<dyn Fn(ChannelEvent) + Send + Sync>;

struct ChannelHandle {
    state: Arc<Mutex<SocketState>>,
    task: tokio::task::JoinHandle<()>,
}

/// Maintains one reconnecting, authenticated logical connection per
/// channel and dispatches typed events to the caller's handler.
///
/// Each channel is driven by a single task, so all handler callbacks and
/// the reconnect timer for that channel run on one cooperative loop, and
/// there is never more than one pending reconnect timer per channel.
pub struct ChannelSocket {
    base_url: String,
    token: String,
    reconnect_delay: Duration,
    channels: Mutex<HashMap<String, ChannelHandle>>,
}

impl ChannelSocket {
    /// `base_url` is the ws scheme server address, e.g. `ws://host:8000`.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            channels: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Open (or keep) the logical connection for a channel. Calling while
    /// already Connected is a no-op, so repeated connects never produce a
    /// second live transport. A stale non-connected handle is torn down
    /// and replaced, cancelling its pending reconnect timer.
    pub fn connect(&self, channel: &str, handler: EventHandler) {
        let mut channels = lock_unpoisoned(&self.channels);

        if let Some(existing) = channels.get(channel) {
            if *lock_unpoisoned(&existing.state) == SocketState::Connected {
                return;
            }
            existing.task.abort();
        }

        let url = format!(
            "{}/ws/{}?token={}",
            self.base_url, channel, self.token
        );
        let state = Arc::new(Mutex::new(SocketState::Disconnected));
        let task = tokio::spawn(drive_channel(
            url,
            channel.to_string(),
            state.clone(),
            handler,
            self.reconnect_delay,
        ));
        channels.insert(channel.to_string(), ChannelHandle { state, task });
    }

    /// Observe the state of a channel's logical connection.
    pub fn state(&self, channel: &str) -> SocketState {
        lock_unpoisoned(&self.channels)
            .get(channel)
            .map(|handle| *lock_unpoisoned(&handle.state))
            .unwrap_or(SocketState::Disconnected)
    }

    /// Tear down one channel: cancels any pending reconnect timer and
    /// closes the live transport. The socket will not reconnect for this
    /// channel unless `connect` is called again.
    pub fn disconnect(&self, channel: &str) {
        let channels = lock_unpoisoned(&self.channels);
        if let Some(handle) = channels.get(channel) {
            handle.task.abort();
            *lock_unpoisoned(&handle.state) = SocketState::Closed;
            tracing::debug!(channel, "Channel socket closed by caller");
        }
    }

    /// Tear down every channel.
    pub fn disconnect_all(&self) {
        let channels = lock_unpoisoned(&self.channels);
        for (channel, handle) in channels.iter() {
            handle.task.abort();
            *lock_unpoisoned(&handle.state) = SocketState::Closed;
            tracing::debug!(channel = %channel, "Channel socket closed by caller");
        }
    }
}

impl Drop for ChannelSocket {
    fn drop(&mut self) {
        self.disconnect_all();
    }
}

/// The state mutex guards a Copy value; a poisoned lock cannot leave it
/// inconsistent, so recover the guard instead of propagating the panic.
fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Per-channel driver: connect, dispatch until close, back off, repeat.
/// This task is the only place a retry is scheduled for its channel.
async fn drive_channel(
    url: String,
    channel: String,
    state: Arc<Mutex<SocketState>>,
    handler: EventHandler,
    reconnect_delay: Duration,
) {
    loop {
        *lock_unpoisoned(&state) = SocketState::Connecting;
        match connect_async(url.as_str()).await {
            Ok((stream, _response)) => {
                *lock_unpoisoned(&state) = SocketState::Connected;
                tracing::debug!(channel = %channel, "Channel socket connected");
                read_until_close(stream, &channel, &handler).await;
                tracing::debug!(channel = %channel, "Channel socket disconnected");
            }
            Err(e) => {
                tracing::warn!(channel = %channel, error = %e, "Channel socket connect failed");
            }
        }
        *lock_unpoisoned(&state) = SocketState::Disconnected;
        tokio::time::sleep(reconnect_delay).await;
    }
}

/// Dispatch decoded events until the transport closes or errors.
/// Malformed payloads are logged and dropped, never crash the client.
async fn read_until_close(
    mut stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    channel: &str,
    handler: &EventHandler,
) {
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<ChannelEvent>(&text) {
                Ok(event) => handler(event),
                Err(e) => {
                    tracing::warn!(channel, error = %e, "Dropping malformed message");
                }
            },
            Ok(Message::Ping(data)) => {
                let _ = stream.send(Message::Pong(data)).await;
            }
            Ok(Message::Close(frame)) => {
                tracing::debug!(channel, reason = ?frame, "Server closed channel socket");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(channel, error = %e, "Channel socket transport error");
                break;
            }
        }
    }
}
