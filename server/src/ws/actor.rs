use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};

use crate::auth::AuthError;
use crate::state::AppState;
use crate::ws::handler::{CLOSE_TOKEN_EXPIRED, CLOSE_TOKEN_INVALID};
use crate::ws::registry::JoinError;

/// Ping interval: server sends WebSocket ping every 30 seconds.
/// Prevents connection leaks from abrupt disconnects.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Pong timeout: if pong not received within 10 seconds after ping, close.
const PONG_TIMEOUT: Duration = Duration::from_secs(10);

/// Run the actor-per-connection pattern for an upgraded WebSocket.
///
/// Splits the WebSocket into reader and writer halves:
/// - Writer task: owns the sink, forwards messages from an mpsc channel
/// - Reader task: processes incoming frames until the transport closes
///
/// The mpsc channel is the connection's send handle: the registry clones
/// it to broadcast to this client.
pub async fn run_connection(
    socket: WebSocket,
    state: AppState,
    channel: &'static str,
    token: String,
) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    // Admission: the registry runs the auth check and registers the send
    // handle in one step. A rejected connection gets a close frame with a
    // distinct code and never becomes a broadcast target.
    let connection_id = match state.registry.join(channel, &token, tx.clone()) {
        Ok(id) => id,
        Err(JoinError::AuthRejected(err)) => {
            let (close_code, reason) = match err {
                AuthError::Expired => (CLOSE_TOKEN_EXPIRED, "Token expired"),
                AuthError::Invalid => (CLOSE_TOKEN_INVALID, "Token invalid"),
            };
            tracing::warn!(channel, close_code, reason, "WebSocket auth failed");
            let _ = ws_sender
                .send(Message::Close(Some(CloseFrame {
                    code: close_code,
                    reason: reason.into(),
                })))
                .await;
            return;
        }
    };

    tracing::info!(channel, "WebSocket actor started");

    // Spawn writer task: forwards mpsc messages to the WebSocket sink
    let writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    // Track pong reception
    let (pong_tx, mut pong_rx) = mpsc::unbounded_channel::<()>();

    // Spawn ping task: sends periodic pings and monitors pong responses
    let ping_tx = tx.clone();
    let ping_handle = tokio::spawn(async move {
        let mut ping_timer = interval(PING_INTERVAL);
        // Skip the first immediate tick
        ping_timer.tick().await;

        loop {
            ping_timer.tick().await;

            if ping_tx.send(Message::Ping(vec![1, 2, 3, 4].into())).is_err() {
                // Writer task has died — connection is gone
                break;
            }

            match timeout(PONG_TIMEOUT, pong_rx.recv()).await {
                Ok(Some(())) => {
                    // Pong received, continue
                }
                _ => {
                    tracing::warn!(channel, "Pong timeout, closing connection");
                    let _ = ping_tx.send(Message::Close(Some(CloseFrame {
                        code: 1001,
                        reason: "Pong timeout".into(),
                    })));
                    break;
                }
            }
        }
    });

    // Reader loop: process incoming WebSocket frames
    loop {
        match ws_receiver.next().await {
            Some(Ok(msg)) => match msg {
                Message::Text(_) => {
                    // Dashboards send application-level keepalives as text
                    // frames; answer with a pong envelope.
                    let reply =
                        serde_json::json!({"type": "pong", "message": "Connection alive"});
                    let _ = tx.send(Message::Text(reply.to_string().into()));
                }
                Message::Binary(_) => {
                    tracing::debug!(channel, "Ignoring unexpected binary frame");
                }
                Message::Pong(_) => {
                    // Pong received — notify the ping task
                    let _ = pong_tx.send(());
                }
                Message::Ping(data) => {
                    // Respond to client pings with pong
                    let _ = tx.send(Message::Pong(data));
                }
                Message::Close(frame) => {
                    tracing::info!(channel, reason = ?frame, "Client initiated close");
                    break;
                }
            },
            Some(Err(e)) => {
                tracing::warn!(channel, error = %e, "WebSocket receive error");
                break;
            }
            None => {
                // Stream ended — client disconnected
                tracing::info!(channel, "WebSocket stream ended");
                break;
            }
        }
    }

    // Cleanup: abort writer and ping tasks, drop registry membership
    writer_handle.abort();
    ping_handle.abort();
    state.registry.leave(connection_id);

    tracing::info!(channel, "WebSocket actor stopped");
}

/// Writer task: receives messages from the mpsc channel and forwards them
/// to the WebSocket sink.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        if ws_sender.send(msg).await.is_err() {
            // WebSocket send failed — connection is broken
            break;
        }
    }
}
