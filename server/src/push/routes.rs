use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::auth::middleware::Claims;
use crate::push::store::SubscriptionKeys;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub endpoint: String,
    pub keys: SubscriptionKeys,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub device_info: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UnsubscribeRequest {
    pub endpoint: String,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionInfo {
    pub endpoint: String,
    pub user_agent: Option<String>,
    pub device_info: Option<String>,
    pub created_at: String,
}

/// POST /api/push/subscribe — upsert the caller's subscription for this
/// endpoint (idempotent; re-subscribing rotates keys in place).
pub async fn subscribe(
    State(state): State<AppState>,
    claims: Claims,
    Json(req): Json<SubscribeRequest>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let store = state.push_store.clone();
    let user_id = claims.sub;
    let result = tokio::task::spawn_blocking(move || {
        store.register(
            &user_id,
            &req.endpoint,
            &req.keys,
            req.user_agent.as_deref(),
            req.device_info.as_deref(),
        )
    })
    .await;

    match result {
        Ok(Ok(())) => Ok(Json(serde_json::json!({"message": "Subscription saved"}))),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Failed to save push subscription");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

/// POST /api/push/unsubscribe — 404 when the endpoint was not registered.
pub async fn unsubscribe(
    State(state): State<AppState>,
    _claims: Claims,
    Json(req): Json<UnsubscribeRequest>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let store = state.push_store.clone();
    let result = tokio::task::spawn_blocking(move || store.unregister(&req.endpoint)).await;

    match result {
        Ok(Ok(true)) => Ok(Json(
            serde_json::json!({"message": "Unsubscribed successfully"}),
        )),
        Ok(Ok(false)) => Err(StatusCode::NOT_FOUND),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Failed to remove push subscription");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

/// GET /api/push/subscriptions — the caller's registered devices. Key
/// material is never echoed back.
pub async fn list_subscriptions(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let store = state.push_store.clone();
    let user_id = claims.sub;
    let result = tokio::task::spawn_blocking(move || store.list_for_user(&user_id)).await;

    match result {
        Ok(Ok(subscriptions)) => {
            let infos: Vec<SubscriptionInfo> = subscriptions
                .into_iter()
                .map(|s| SubscriptionInfo {
                    endpoint: s.endpoint,
                    user_agent: s.user_agent,
                    device_info: s.device_info,
                    created_at: s.created_at,
                })
                .collect();
            Ok(Json(serde_json::json!({"subscriptions": infos})))
        }
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Failed to list push subscriptions");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}
