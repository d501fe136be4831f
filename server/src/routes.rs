use axum::{middleware, Router};

use crate::auth::middleware::JwtSecret;
use crate::push::routes as push_routes;
use crate::state::AppState;
use crate::ws::handler as ws_handler;

/// Inject the JWT secret into request extensions so the Claims extractor can find it.
async fn inject_jwt_secret(
    axum::extract::State(state): axum::extract::State<AppState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: middleware::Next,
) -> axum::response::Response {
    req.extensions_mut()
        .insert(JwtSecret(state.jwt_secret.clone()));
    next.run(req).await
}

/// Build the full axum Router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    // Push subscription management (JWT required — Claims extractor)
    let push_api = Router::new()
        .route(
            "/api/push/subscribe",
            axum::routing::post(push_routes::subscribe),
        )
        .route(
            "/api/push/unsubscribe",
            axum::routing::post(push_routes::unsubscribe),
        )
        .route(
            "/api/push/subscriptions",
            axum::routing::get(push_routes::list_subscriptions),
        );

    // WebSocket endpoints (auth via query param, not JWT header)
    let ws_routes = Router::new()
        .route("/ws/alerts", axum::routing::get(ws_handler::ws_alerts))
        .route("/ws/devices", axum::routing::get(ws_handler::ws_devices));

    // Health check
    let health = Router::new().route("/health", axum::routing::get(health_check));

    Router::new()
        .merge(push_api)
        .merge(ws_routes)
        .merge(health)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            inject_jwt_secret,
        ))
        .with_state(state)
}

/// Basic health check endpoint
async fn health_check() -> &'static str {
    "ok"
}
