//! Domain error types for the shard coordinator
//!
//! Every fallible operation in the library returns
//! `Result<T, CoordinatorError>`. main.rs is the ONLY module allowed to use
//! anyhow::Result (process boundary).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Coordinator domain errors
///
/// Every variant carries structured context fields for diagnostics, so a
/// shard client (or an on-call engineer) can pattern-match on the variant
/// instead of parsing message strings.
///
/// Example log output:
/// ```text
/// CoordinatorError::UnknownShard { shard_id: 12, total_shards: 8 }
/// → "shard 12 is outside the configured range [0, 8)"
/// ```
#[derive(Error, Debug)]
pub enum CoordinatorError {
    /// Every shard slot is registered; the caller should back off and retry
    #[error("all {total_shards} shard slots are registered")]
    CapacityExhausted { total_shards: u32 },

    /// Shard id does not name a slot
    #[error("shard {shard_id} is outside the configured range [0, {total_shards})")]
    UnknownShard { shard_id: u32, total_shards: u32 },

    /// Shard id is in range but the slot is not currently registered
    #[error("shard {shard_id} is not registered")]
    ShardNotRegistered { shard_id: u32 },

    /// A streamed partition record could not be decoded
    #[error("malformed partition record on line {line}")]
    MalformedRecord {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// Request body stream failed before the push completed
    #[error("request body stream failed")]
    BodyStreamFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Pushed snapshot exceeded the accepted body size
    #[error("snapshot body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    /// Asset bytes could not be written (transient IO failure)
    #[error("failed to write asset to {}", path.display())]
    AssetWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Asset upload carried no bytes
    #[error("asset upload is empty")]
    EmptyAsset,

    /// Asset name, filetype or location is not a single safe path segment
    #[error("invalid asset path component '{component}'")]
    InvalidAssetPath { component: String },

    /// NATS publish failed for a specific subject
    #[error("NATS publish failed for subject '{subject}'")]
    NatsPublishFailed {
        subject: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// NATS connection failed
    #[error("NATS connection failed")]
    NatsConnectionFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Lifecycle event serialization failed
    #[error("event serialization failed for {event_type}")]
    SerializationFailed {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },

    /// Configuration error (environment variable missing or invalid)
    #[error("configuration error: {0}")]
    Config(String),
}

impl CoordinatorError {
    /// Returns a static label string suitable for Prometheus metrics.
    ///
    /// Used as the `error_type` label on `coordinator_errors_total` and as
    /// the `error_type` field of HTTP error bodies.
    pub fn error_type_label(&self) -> &'static str {
        match self {
            Self::CapacityExhausted { .. } => "capacity_exhausted",
            Self::UnknownShard { .. } => "unknown_shard",
            Self::ShardNotRegistered { .. } => "shard_not_registered",
            Self::MalformedRecord { .. } => "malformed_record",
            Self::BodyStreamFailed(_) => "body_stream",
            Self::PayloadTooLarge { .. } => "payload_too_large",
            Self::AssetWriteFailed { .. } => "asset_write",
            Self::EmptyAsset => "empty_asset",
            Self::InvalidAssetPath { .. } => "invalid_asset_path",
            Self::NatsPublishFailed { .. } => "nats_publish",
            Self::NatsConnectionFailed(_) => "nats_connection",
            Self::SerializationFailed { .. } => "serialization",
            Self::Config(_) => "config",
        }
    }

    /// HTTP status for this error on the RPC surface
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::CapacityExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::UnknownShard { .. } => StatusCode::NOT_FOUND,
            Self::ShardNotRegistered { .. } => StatusCode::CONFLICT,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::MalformedRecord { .. }
            | Self::BodyStreamFailed(_)
            | Self::EmptyAsset
            | Self::InvalidAssetPath { .. } => StatusCode::BAD_REQUEST,
            Self::AssetWriteFailed { .. }
            | Self::NatsPublishFailed { .. }
            | Self::NatsConnectionFailed(_)
            | Self::SerializationFailed { .. }
            | Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Structured error body returned to shard clients
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub error_type: &'static str,
}

impl IntoResponse for CoordinatorError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
            error_type: self.error_type_label(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}
