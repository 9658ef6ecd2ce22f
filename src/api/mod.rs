//! Coordinator RPC surface
//!
//! Register, Checkin, UpdateGuilds, QueryAggregate and StreamAllGuilds over
//! HTTP/JSON. Streaming directions use NDJSON, one guild record per line.

mod handlers;

use crate::assets::AssetPublisher;
use crate::coordinator::Coordinator;
use crate::health;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

/// Largest guild snapshot push accepted, in bytes
pub const MAX_SNAPSHOT_BYTES: usize = 8 * 1024 * 1024;

/// Largest asset upload accepted, in bytes
pub const MAX_ASSET_BYTES: usize = 16 * 1024 * 1024;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Coordinator,
    pub assets: AssetPublisher,
}

/// Build the full router: RPCs, diagnostics, health and metrics
pub fn router(state: AppState) -> Router {
    let coordinator = state.coordinator.clone();

    Router::new()
        .route("/shards", get(handlers::fleet))
        .route("/shards/register", post(handlers::register))
        .route("/shards/{shard_id}/checkin", post(handlers::checkin))
        .route("/shards/{shard_id}/guilds", post(handlers::update_guilds))
        .route("/guilds", get(handlers::all_guilds))
        .route("/guilds/count", get(handlers::guild_count))
        .route(
            "/assets",
            post(handlers::publish_asset).layer(DefaultBodyLimit::max(MAX_ASSET_BYTES)),
        )
        .with_state(state)
        .merge(health::router(coordinator))
}
