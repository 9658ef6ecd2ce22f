//! Shard Coordinator
//!
//! Coordinates a fixed-size fleet of bot shard processes:
//! - Hands out shard ids from a bounded pool (lowest free id first)
//! - Tracks liveness via periodic checkins and evicts silent shards
//! - Aggregates each shard's latest guild snapshot into fleet-wide counts
//! - Publishes uploaded assets and shard lifecycle events
//!
//! All cluster state lives behind a single lock owned by [`Coordinator`];
//! the HTTP handlers and the [`LivenessMonitor`] only ever mutate it through
//! that type.

pub mod api;
pub mod assets;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod guilds;
pub mod health;
pub mod metrics;
pub mod nats;
pub mod shard;

pub use config::CoordinatorConfig;
pub use coordinator::{ClusterState, Coordinator, FleetReport, Registration};
pub use error::CoordinatorError;
pub use guilds::{Aggregate, PartitionRecord, StalePartitionPolicy};
pub use shard::{Heartbeat, LivenessMonitor};
