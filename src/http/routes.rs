//! HTTP route definitions

use std::time::Duration;

use axum::{extract::State, response::Json, routing::get, Router};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};

use crate::app::AppState;
use crate::util::time::uptime_secs;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(Duration::from_secs(10)))
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    relay_addr: String,
    waiting_requests: usize,
    connections: usize,
    active_pairs: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.relay.stats();

    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        relay_addr: state.config.relay_addr.to_string(),
        waiting_requests: stats.waiting_requests,
        connections: stats.connections,
        active_pairs: stats.active_pairs,
    })
}
