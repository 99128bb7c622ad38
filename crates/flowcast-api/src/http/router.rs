//! Axum router configuration with middleware.
//!
//! Routes:
//! - `GET /health`
//! - `GET /api/flow/unusual`
//! - `GET /ws/flow` (WebSocket)
//!
//! Middleware: CORS, tracing.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/flow/unusual", get(handlers::flow::get_unusual_flow))
        .route("/ws/flow", get(handlers::ws::ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - liveness plus current subscriber and history counts.
async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "ok": true,
        "version": env!("CARGO_PKG_VERSION"),
        "subscribers": state.hub.len(),
        "stored_events": state.store.len(),
    }))
}
