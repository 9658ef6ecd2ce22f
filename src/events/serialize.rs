//! Lifecycle event serialization for the message broker
//!
//! Converts shard lifecycle transitions into JSON envelopes for NATS
//! publishing.

use crate::guilds::Aggregate;
use serde::Serialize;
use uuid::Uuid;

/// A shard lifecycle transition observed by the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardLifecycle {
    /// Register handed out a slot
    Registered { shard_id: u32, total_shards: u32 },
    /// A checkin re-admitted an evicted slot
    Readmitted { shard_id: u32 },
    /// The liveness monitor deregistered a silent shard
    Evicted { shard_id: u32 },
    /// A shard replaced its guild snapshot
    GuildsUpdated { shard_id: u32, totals: Aggregate },
}

impl ShardLifecycle {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Registered { .. } => "shard.registered",
            Self::Readmitted { .. } => "shard.readmitted",
            Self::Evicted { .. } => "shard.evicted",
            Self::GuildsUpdated { .. } => "guilds.updated",
        }
    }

    pub fn shard_id(&self) -> u32 {
        match *self {
            Self::Registered { shard_id, .. }
            | Self::Readmitted { shard_id }
            | Self::Evicted { shard_id }
            | Self::GuildsUpdated { shard_id, .. } => shard_id,
        }
    }

    fn data(&self) -> serde_json::Value {
        match self {
            Self::Registered { total_shards, .. } => serde_json::json!({
                "total_shards": total_shards,
            }),
            Self::GuildsUpdated { totals, .. } => serde_json::json!({
                "guild_count": totals.guild_count,
                "user_count": totals.user_count,
            }),
            Self::Readmitted { .. } | Self::Evicted { .. } => serde_json::Value::Null,
        }
    }
}

/// Envelope published for every lifecycle transition
#[derive(Debug, Clone, Serialize)]
pub struct CoordinatorEvent {
    pub event_id: String,
    pub event_type: String,
    pub shard_id: u32,
    pub timestamp: u64,
    pub data: serde_json::Value,
}

/// Wrap a lifecycle transition in a fresh envelope
pub fn serialize_lifecycle(event: &ShardLifecycle) -> CoordinatorEvent {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;

    CoordinatorEvent {
        event_id: Uuid::new_v4().to_string(),
        event_type: event.event_type().to_string(),
        shard_id: event.shard_id(),
        timestamp,
        data: event.data(),
    }
}
