//! Coordinator service
//!
//! Owns the one `ClusterState` instance behind a single `RwLock`. Every
//! mutation (register, checkin, guild push, liveness sweep) takes the write
//! lock for its whole read-modify-write and reads "now" while holding it, so
//! timestamps observed by the registry are totally ordered. Aggregate reads
//! and stream setup share the read lock.

use crate::config::CoordinatorConfig;
use crate::error::CoordinatorError;
use crate::events::{serialize_lifecycle, ShardLifecycle};
use crate::guilds::{Aggregate, AllRecords, GuildStateStore, Invalidation, PartitionRecord};
use crate::metrics::CoordinatorMetrics;
use crate::nats::NatsPublisher;
use crate::shard::{Heartbeat, ShardRegistry};

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Everything the coordinator knows about the fleet
#[derive(Debug)]
pub struct ClusterState {
    registry: ShardRegistry,
    guilds: GuildStateStore,
}

impl ClusterState {
    pub fn new(config: &CoordinatorConfig) -> Self {
        Self {
            registry: ShardRegistry::new(config.total_shards),
            guilds: GuildStateStore::new(config.stale_policy),
        }
    }

    /// Replace a registered shard's snapshot
    pub fn replace_snapshot(
        &mut self,
        shard_id: u32,
        records: Vec<PartitionRecord>,
    ) -> Result<bool, CoordinatorError> {
        if !self.registry.is_registered(shard_id)? {
            return Err(CoordinatorError::ShardNotRegistered { shard_id });
        }
        Ok(self.guilds.replace_snapshot(shard_id, records))
    }

    /// Sweep the registry and invalidate every evicted shard's snapshot
    pub fn sweep(&mut self, now: Instant, timeout: std::time::Duration) -> Vec<(u32, Invalidation)> {
        self.registry
            .sweep(now, timeout)
            .into_iter()
            .map(|shard_id| (shard_id, self.guilds.invalidate(shard_id)))
            .collect()
    }
}

/// Response to Register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Registration {
    pub shard_id: u32,
    pub total_shards: u32,
}

/// Diagnostic view of one slot
#[derive(Debug, Clone, Serialize)]
pub struct SlotReport {
    pub id: u32,
    pub registered: bool,
    pub last_checkin_ms_ago: Option<u64>,
    pub guilds: u64,
    pub stale: bool,
}

/// Diagnostic view of the whole fleet
#[derive(Debug, Clone, Serialize)]
pub struct FleetReport {
    pub total_shards: u32,
    pub registered: usize,
    pub slots: Vec<SlotReport>,
}

/// Request-handling facade shared by the HTTP handlers and the liveness monitor
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    config: CoordinatorConfig,
    state: RwLock<ClusterState>,
    metrics: Arc<CoordinatorMetrics>,
    nats: Option<Arc<NatsPublisher>>,
}

impl Coordinator {
    pub fn new(
        config: CoordinatorConfig,
        metrics: Arc<CoordinatorMetrics>,
        nats: Option<Arc<NatsPublisher>>,
    ) -> Self {
        let state = ClusterState::new(&config);
        metrics.set_shards_registered(0);
        metrics.set_aggregate(Aggregate::default());

        Self {
            inner: Arc::new(CoordinatorInner {
                config,
                state: RwLock::new(state),
                metrics,
                nats,
            }),
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    pub fn total_shards(&self) -> u32 {
        self.inner.config.total_shards
    }

    pub fn metrics(&self) -> &CoordinatorMetrics {
        &self.inner.metrics
    }

    pub fn nats(&self) -> Option<&Arc<NatsPublisher>> {
        self.inner.nats.as_ref()
    }

    /// Hand out the lowest free shard id
    pub async fn register(&self) -> Result<Registration, CoordinatorError> {
        let total_shards = self.total_shards();
        let (result, registered) = {
            let mut state = self.inner.state.write().await;
            let result = state.registry.acquire(Instant::now());
            (result, state.registry.registered_count())
        };

        let shard_id = match result {
            Ok(shard_id) => shard_id,
            Err(e) => {
                warn!(total_shards, "Shard tried to register but every slot is taken");
                self.inner.metrics.record_registration_rejected();
                self.inner.metrics.record_error(e.error_type_label());
                return Err(e);
            }
        };

        info!(
            shard_id,
            total_shards,
            "Shard requested id, assigning {}/{}",
            shard_id + 1,
            total_shards
        );
        self.inner.metrics.record_registration();
        self.inner.metrics.set_shards_registered(registered);
        self.emit(ShardLifecycle::Registered { shard_id, total_shards });

        Ok(Registration { shard_id, total_shards })
    }

    /// Record a heartbeat from `shard_id`
    pub async fn checkin(&self, shard_id: u32) -> Result<Heartbeat, CoordinatorError> {
        let (result, registered) = {
            let mut state = self.inner.state.write().await;
            let result = state.registry.heartbeat(shard_id, Instant::now());
            (result, state.registry.registered_count())
        };

        let outcome = result.map_err(|e| self.fail(e))?;

        self.inner.metrics.record_checkin(shard_id);
        if outcome == Heartbeat::Readmitted {
            warn!(shard_id, "Checkin from deregistered shard, re-admitting");
            self.inner.metrics.record_readmission(shard_id);
            self.inner.metrics.set_shards_registered(registered);
            self.emit(ShardLifecycle::Readmitted { shard_id });
        } else {
            debug!(shard_id, "Checkin");
        }

        Ok(outcome)
    }

    /// Replace the guild snapshot of `shard_id`
    ///
    /// Returns `Ok(false)` for an empty push.
    pub async fn update_guilds(
        &self,
        shard_id: u32,
        records: Vec<PartitionRecord>,
    ) -> Result<bool, CoordinatorError> {
        let count = records.len();
        let (result, aggregate, totals) = {
            let mut state = self.inner.state.write().await;
            let result = state.replace_snapshot(shard_id, records);
            let totals = state.guilds.summary(shard_id).map(|s| Aggregate {
                guild_count: s.guilds,
                user_count: s.users,
            });
            (result, state.guilds.aggregate(), totals)
        };

        let accepted = result.map_err(|e| self.fail(e))?;
        if !accepted {
            debug!(shard_id, "Received empty guild list, ignoring");
            return Ok(false);
        }

        debug!(shard_id, guilds = count, "Received guild list");
        self.inner.metrics.record_guild_update(shard_id);
        self.inner.metrics.set_aggregate(aggregate);
        if let Some(totals) = totals {
            self.emit(ShardLifecycle::GuildsUpdated { shard_id, totals });
        }

        Ok(true)
    }

    /// Guild and user totals over every stored snapshot
    pub async fn query_aggregate(&self) -> Aggregate {
        self.inner.state.read().await.guilds.aggregate()
    }

    /// Capture the current snapshots for streaming
    ///
    /// The read lock is only held while the snapshot `Arc`s are cloned.
    pub async fn stream_all_guilds(&self) -> AllRecords {
        self.inner.state.read().await.guilds.all_records()
    }

    /// One liveness sweep; returns the evicted shard ids
    pub async fn sweep_expired(&self) -> Vec<u32> {
        let started = std::time::Instant::now();
        let timeout = self.inner.config.heartbeat_timeout;

        let (evicted, registered, aggregate) = {
            let mut state = self.inner.state.write().await;
            let evicted = state.sweep(Instant::now(), timeout);
            (evicted, state.registry.registered_count(), state.guilds.aggregate())
        };

        self.inner.metrics.record_sweep(started.elapsed());
        if evicted.is_empty() {
            return Vec::new();
        }

        for (shard_id, invalidation) in &evicted {
            error!(
                shard_id,
                timeout_secs = timeout.as_secs_f64(),
                ?invalidation,
                "Shard {} missed its heartbeat, deregistering",
                shard_id
            );
            self.inner.metrics.record_eviction(*shard_id);
            self.emit(ShardLifecycle::Evicted { shard_id: *shard_id });
        }
        self.inner.metrics.set_shards_registered(registered);
        self.inner.metrics.set_aggregate(aggregate);

        evicted.into_iter().map(|(shard_id, _)| shard_id).collect()
    }

    /// Read-only view of every slot
    pub async fn fleet_report(&self) -> FleetReport {
        let state = self.inner.state.read().await;
        let now = Instant::now();

        let slots = state
            .registry
            .snapshot()
            .into_iter()
            .map(|slot| {
                let summary = state.guilds.summary(slot.id);
                SlotReport {
                    id: slot.id,
                    registered: slot.registered,
                    last_checkin_ms_ago: slot
                        .last_checkin
                        .map(|at| now.saturating_duration_since(at).as_millis() as u64),
                    guilds: summary.map_or(0, |s| s.guilds),
                    stale: summary.is_some_and(|s| s.stale),
                }
            })
            .collect();

        FleetReport {
            total_shards: state.registry.total_shards(),
            registered: state.registry.registered_count(),
            slots,
        }
    }

    fn fail(&self, err: CoordinatorError) -> CoordinatorError {
        self.inner.metrics.record_error(err.error_type_label());
        err
    }

    /// Publish a lifecycle event off the request path
    fn emit(&self, event: ShardLifecycle) {
        let Some(nats) = self.inner.nats.clone() else {
            return;
        };
        let metrics = Arc::clone(&self.inner.metrics);

        tokio::spawn(async move {
            let payload = serialize_lifecycle(&event);
            if let Err(e) = nats.publish_event(&payload).await {
                metrics.record_error(e.error_type_label());
                warn!(shard_id = event.shard_id(), error = %e, "Failed to publish lifecycle event");
            }
        });
    }
}
