//! Request handlers
//!
//! Each handler translates one call onto the coordinator and nothing more.

use super::{AppState, MAX_SNAPSHOT_BYTES};
use crate::assets::{PublishRequest, PublishedAsset};
use crate::coordinator::{FleetReport, Registration};
use crate::error::CoordinatorError;
use crate::guilds::{ndjson, Aggregate};
use crate::shard::Heartbeat;
use axum::body::{Body, Bytes};
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use serde::Serialize;

/// Checkin acknowledgement
#[derive(Debug, Serialize)]
pub struct CheckinAck {
    pub ok: bool,
    pub readmitted: bool,
}

/// Guild push acknowledgement; `ok` is false for an empty push
#[derive(Debug, Serialize)]
pub struct UpdateAck {
    pub ok: bool,
}

pub async fn register(State(state): State<AppState>) -> Result<Json<Registration>, CoordinatorError> {
    state.coordinator.register().await.map(Json)
}

pub async fn checkin(
    State(state): State<AppState>,
    Path(shard_id): Path<u32>,
) -> Result<Json<CheckinAck>, CoordinatorError> {
    let outcome = state.coordinator.checkin(shard_id).await?;
    Ok(Json(CheckinAck {
        ok: true,
        readmitted: outcome == Heartbeat::Readmitted,
    }))
}

/// Client-streamed snapshot: the whole body is one `replace_snapshot`
pub async fn update_guilds(
    State(state): State<AppState>,
    Path(shard_id): Path<u32>,
    body: Body,
) -> Result<Json<UpdateAck>, CoordinatorError> {
    let records = ndjson::decode_records(body.into_data_stream(), MAX_SNAPSHOT_BYTES)
        .await
        .inspect_err(|e| state.coordinator.metrics().record_error(e.error_type_label()))?;

    let ok = state.coordinator.update_guilds(shard_id, records).await?;
    Ok(Json(UpdateAck { ok }))
}

pub async fn guild_count(State(state): State<AppState>) -> Json<Aggregate> {
    Json(state.coordinator.query_aggregate().await)
}

/// Server-streamed guild records, one per line
pub async fn all_guilds(State(state): State<AppState>) -> Response {
    let records = state.coordinator.stream_all_guilds().await;
    let lines = futures::stream::iter(records).map(|record| ndjson::encode_record(&record));

    (
        [(header::CONTENT_TYPE, ndjson::CONTENT_TYPE)],
        Body::from_stream(lines),
    )
        .into_response()
}

pub async fn fleet(State(state): State<AppState>) -> Json<FleetReport> {
    Json(state.coordinator.fleet_report().await)
}

pub async fn publish_asset(
    State(state): State<AppState>,
    Query(request): Query<PublishRequest>,
    bytes: Bytes,
) -> Result<Json<PublishedAsset>, CoordinatorError> {
    state
        .assets
        .publish(&request, &bytes)
        .await
        .map(Json)
        .inspect_err(|e| state.coordinator.metrics().record_error(e.error_type_label()))
}
