//! Health check endpoints

use crate::coordinator::Coordinator;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub total_shards: u32,
    pub nats_connected: bool,
}

/// Create the health check router
pub fn router(coordinator: Coordinator) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(coordinator)
}

/// Health endpoint - always returns 200 if process is running
async fn health_handler(State(coordinator): State<Coordinator>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        total_shards: coordinator.total_shards(),
        // local mode counts as connected
        nats_connected: coordinator.nats().is_none_or(|n| n.is_connected()),
    })
}

/// Metrics endpoint - returns Prometheus format metrics
async fn metrics_handler(State(coordinator): State<Coordinator>) -> impl IntoResponse {
    if let Some(nats) = coordinator.nats() {
        coordinator.metrics().set_nats_connected(nats.is_connected());
    }

    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        coordinator.metrics().render(),
    )
}
