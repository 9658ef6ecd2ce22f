//! Latest guild snapshot per shard
//!
//! Each shard's snapshot is an immutable `Arc<Vec<_>>` that is swapped out
//! wholesale on every push. Readers clone the `Arc`s and iterate without
//! holding the cluster lock, so a concurrent push can never tear a record
//! list that is already being streamed.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use twilight_model::id::marker::{GuildMarker, UserMarker};
use twilight_model::id::Id;

/// One guild owned by a shard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionRecord {
    pub guild_id: Id<GuildMarker>,
    pub member_count: u64,
    #[serde(default)]
    pub admin_ids: BTreeSet<Id<UserMarker>>,
}

/// Guild and user totals across every stored snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregate {
    pub guild_count: u64,
    pub user_count: u64,
}

impl Aggregate {
    fn of(records: &[PartitionRecord]) -> Self {
        Self {
            guild_count: records.len() as u64,
            // member counts are shard-reported; clamp instead of overflowing
            user_count: records
                .iter()
                .fold(0u64, |acc, r| acc.saturating_add(r.member_count)),
        }
    }
}

impl std::ops::Add for Aggregate {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            guild_count: self.guild_count.saturating_add(rhs.guild_count),
            user_count: self.user_count.saturating_add(rhs.user_count),
        }
    }
}

/// What eviction does to a shard's stored snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StalePartitionPolicy {
    /// Drop the snapshot; aggregates stop counting the shard immediately
    #[default]
    Discard,
    /// Keep counting the snapshot, flagged stale, until the shard pushes again
    Retain,
}

impl fmt::Display for StalePartitionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Discard => "discard",
            Self::Retain => "retain",
        })
    }
}

impl FromStr for StalePartitionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "discard" | "drop" => Ok(Self::Discard),
            "retain" | "keep-stale" => Ok(Self::Retain),
            other => Err(format!("unknown policy '{other}' (expected discard or retain)")),
        }
    }
}

/// Result of invalidating a shard's snapshot on eviction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invalidation {
    /// No snapshot was stored for the shard
    Absent,
    /// Snapshot removed
    Discarded(Aggregate),
    /// Snapshot kept and flagged stale
    MarkedStale(Aggregate),
}

#[derive(Debug, Clone)]
struct ShardSnapshot {
    records: Arc<Vec<PartitionRecord>>,
    totals: Aggregate,
    stale: bool,
}

/// Per-shard summary for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotSummary {
    pub guilds: u64,
    pub users: u64,
    pub stale: bool,
}

/// Holds the latest snapshot pushed by each shard
#[derive(Debug, Clone, Default)]
pub struct GuildStateStore {
    snapshots: BTreeMap<u32, ShardSnapshot>,
    policy: StalePartitionPolicy,
}

impl GuildStateStore {
    pub fn new(policy: StalePartitionPolicy) -> Self {
        Self {
            snapshots: BTreeMap::new(),
            policy,
        }
    }

    /// Replace the shard's snapshot with `records`
    ///
    /// An empty push is a no-op report and returns `false`; the previous
    /// snapshot is left in place. Registration is checked by the caller.
    pub fn replace_snapshot(&mut self, shard_id: u32, records: Vec<PartitionRecord>) -> bool {
        if records.is_empty() {
            return false;
        }

        let totals = Aggregate::of(&records);
        self.snapshots.insert(
            shard_id,
            ShardSnapshot {
                records: Arc::new(records),
                totals,
                stale: false,
            },
        );
        true
    }

    /// Totals over every stored snapshot, stale ones included
    pub fn aggregate(&self) -> Aggregate {
        self.snapshots
            .values()
            .fold(Aggregate::default(), |acc, snapshot| acc + snapshot.totals)
    }

    /// One pass over every stored record, in shard id order
    ///
    /// The iterator owns the snapshots it was created from; pushes that land
    /// after this call are not observed.
    pub fn all_records(&self) -> AllRecords {
        AllRecords::new(self.snapshots.values().map(|s| Arc::clone(&s.records)).collect())
    }

    /// Apply the configured stale policy to an evicted shard
    pub fn invalidate(&mut self, shard_id: u32) -> Invalidation {
        match self.policy {
            StalePartitionPolicy::Discard => match self.snapshots.remove(&shard_id) {
                Some(snapshot) => Invalidation::Discarded(snapshot.totals),
                None => Invalidation::Absent,
            },
            StalePartitionPolicy::Retain => match self.snapshots.get_mut(&shard_id) {
                Some(snapshot) => {
                    snapshot.stale = true;
                    Invalidation::MarkedStale(snapshot.totals)
                }
                None => Invalidation::Absent,
            },
        }
    }

    pub fn summary(&self, shard_id: u32) -> Option<SnapshotSummary> {
        self.snapshots.get(&shard_id).map(|snapshot| SnapshotSummary {
            guilds: snapshot.totals.guild_count,
            users: snapshot.totals.user_count,
            stale: snapshot.stale,
        })
    }
}

/// Lazy iterator over a captured set of shard snapshots
#[derive(Debug)]
pub struct AllRecords {
    snapshots: std::vec::IntoIter<Arc<Vec<PartitionRecord>>>,
    current: Option<Arc<Vec<PartitionRecord>>>,
    position: usize,
}

impl AllRecords {
    fn new(snapshots: Vec<Arc<Vec<PartitionRecord>>>) -> Self {
        Self {
            snapshots: snapshots.into_iter(),
            current: None,
            position: 0,
        }
    }
}

impl Iterator for AllRecords {
    type Item = PartitionRecord;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(records) = &self.current {
                if let Some(record) = records.get(self.position) {
                    self.position += 1;
                    return Some(record.clone());
                }
            }
            self.current = Some(self.snapshots.next()?);
            self.position = 0;
        }
    }
}
