//! Shard identity pool and liveness timestamps
//!
//! Pure state: every method takes `&mut self` plus the current instant and
//! is called by the coordinator while it holds the cluster write lock.

use crate::error::CoordinatorError;
use std::time::Duration;
use tokio::time::Instant;

/// Coordinator-side record of one shard identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardSlot {
    pub id: u32,
    pub registered: bool,
    /// Only `Some` while `registered` is true
    pub last_checkin: Option<Instant>,
}

impl ShardSlot {
    fn vacant(id: u32) -> Self {
        Self {
            id,
            registered: false,
            last_checkin: None,
        }
    }

    fn admit(&mut self, now: Instant) {
        self.registered = true;
        // never move a live timestamp backwards
        self.last_checkin = Some(match self.last_checkin {
            Some(prev) if prev > now => prev,
            _ => now,
        });
    }

    fn evict(&mut self) {
        self.registered = false;
        self.last_checkin = None;
    }

    /// True if the slot is registered and its last checkin is older than `cutoff`
    fn is_stale(&self, cutoff: Instant) -> bool {
        self.registered && self.last_checkin.is_some_and(|at| at < cutoff)
    }
}

/// Outcome of a heartbeat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Heartbeat {
    /// Slot was registered; its timestamp moved forward
    Refreshed,
    /// Slot had been evicted (or never registered) and is admitted again
    Readmitted,
}

/// Fixed pool of shard identities `[0, total_shards)`
#[derive(Debug, Clone)]
pub struct ShardRegistry {
    slots: Vec<ShardSlot>,
}

impl ShardRegistry {
    /// Create a registry with every slot vacant
    pub fn new(total_shards: u32) -> Self {
        Self {
            slots: (0..total_shards).map(ShardSlot::vacant).collect(),
        }
    }

    pub fn total_shards(&self) -> u32 {
        self.slots.len() as u32
    }

    /// Claim the lowest vacant slot
    pub fn acquire(&mut self, now: Instant) -> Result<u32, CoordinatorError> {
        let total_shards = self.total_shards();
        let slot = self
            .slots
            .iter_mut()
            .find(|slot| !slot.registered)
            .ok_or(CoordinatorError::CapacityExhausted { total_shards })?;
        slot.admit(now);
        Ok(slot.id)
    }

    /// Record a checkin, re-admitting the slot if it had been evicted
    pub fn heartbeat(&mut self, shard_id: u32, now: Instant) -> Result<Heartbeat, CoordinatorError> {
        let slot = self.slot_mut(shard_id)?;
        let outcome = if slot.registered {
            Heartbeat::Refreshed
        } else {
            Heartbeat::Readmitted
        };
        slot.admit(now);
        Ok(outcome)
    }

    /// Evict every registered slot whose last checkin is older than `now - timeout`
    ///
    /// Returns the evicted ids in ascending order.
    pub fn sweep(&mut self, now: Instant, timeout: Duration) -> Vec<u32> {
        // Nothing can be older than the process's own clock origin
        let Some(cutoff) = now.checked_sub(timeout) else {
            return Vec::new();
        };

        self.slots
            .iter_mut()
            .filter(|slot| slot.is_stale(cutoff))
            .map(|slot| {
                slot.evict();
                slot.id
            })
            .collect()
    }

    /// Whether `shard_id` is currently registered
    pub fn is_registered(&self, shard_id: u32) -> Result<bool, CoordinatorError> {
        self.slot(shard_id).map(|slot| slot.registered)
    }

    /// Number of registered slots
    pub fn registered_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.registered).count()
    }

    /// Copy of every slot, ordered by id
    pub fn snapshot(&self) -> Vec<ShardSlot> {
        self.slots.clone()
    }

    fn slot(&self, shard_id: u32) -> Result<&ShardSlot, CoordinatorError> {
        let total_shards = self.total_shards();
        self.slots
            .get(shard_id as usize)
            .ok_or(CoordinatorError::UnknownShard { shard_id, total_shards })
    }

    fn slot_mut(&mut self, shard_id: u32) -> Result<&mut ShardSlot, CoordinatorError> {
        let total_shards = self.total_shards();
        self.slots
            .get_mut(shard_id as usize)
            .ok_or(CoordinatorError::UnknownShard { shard_id, total_shards })
    }
}
