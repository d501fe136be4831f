use axum::{
    extract::{ws::WebSocketUpgrade, Query, State},
    response::Response,
};
use serde::Deserialize;

use crate::state::AppState;
use crate::ws::actor;
use crate::ws::registry::{CHANNEL_ALERTS, CHANNEL_DEVICES};

/// Query parameters for WebSocket connection.
/// Auth is via query param: browsers cannot set headers on WS upgrades.
#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    pub token: Option<String>,
}

/// WebSocket close codes for rejected connections:
/// 4001 = token expired
/// 4002 = token invalid or missing
pub const CLOSE_TOKEN_EXPIRED: u16 = 4001;
pub const CLOSE_TOKEN_INVALID: u16 = 4002;

/// GET /ws/alerts?token=JWT
pub async fn ws_alerts(
    State(state): State<AppState>,
    Query(params): Query<WsAuthQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    upgrade_to_channel(state, params, ws, CHANNEL_ALERTS)
}

/// GET /ws/devices?token=JWT
pub async fn ws_devices(
    State(state): State<AppState>,
    Query(params): Query<WsAuthQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    upgrade_to_channel(state, params, ws, CHANNEL_DEVICES)
}

/// Upgrade the connection and hand it to the per-connection actor. The
/// admission check itself runs inside the registry join, so a rejected
/// connection is upgraded and then immediately closed with a distinct
/// close code rather than silently admitted.
fn upgrade_to_channel(
    state: AppState,
    params: WsAuthQuery,
    ws: WebSocketUpgrade,
    channel: &'static str,
) -> Response {
    let token = params.token.unwrap_or_default();
    ws.on_upgrade(move |socket| actor::run_connection(socket, state, channel, token))
}
