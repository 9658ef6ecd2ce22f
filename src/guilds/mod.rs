//! Guild partition state reported by shards

pub mod ndjson;
mod store;

pub use store::{
    Aggregate, AllRecords, GuildStateStore, Invalidation, PartitionRecord, SnapshotSummary,
    StalePartitionPolicy,
};
