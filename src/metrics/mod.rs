//! Prometheus metrics module
//!
//! Counters and gauges for registrations, checkins, evictions and the
//! aggregate guild view, rendered on `GET /metrics`.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::warn;

use crate::guilds::Aggregate;

/// The process-wide recorder can only be installed once
static PROMETHEUS: OnceLock<PrometheusHandle> = OnceLock::new();

/// Coordinator metrics collector
#[derive(Clone)]
pub struct CoordinatorMetrics {
    handle: Arc<PrometheusHandle>,
}

impl CoordinatorMetrics {
    /// Install (or reuse) the Prometheus recorder and return a handle
    pub fn new() -> Self {
        let handle = PROMETHEUS
            .get_or_init(|| {
                let recorder = PrometheusBuilder::new().build_recorder();
                let handle = recorder.handle();
                if metrics::set_global_recorder(recorder).is_err() {
                    warn!("A metrics recorder is already installed; /metrics will be empty");
                }
                Self::register_metrics();
                handle
            })
            .clone();

        Self {
            handle: Arc::new(handle),
        }
    }

    /// Register metric descriptions
    fn register_metrics() {
        describe_counter!(
            "coordinator_registrations_total",
            Unit::Count,
            "Shard ids handed out by Register"
        );
        describe_counter!(
            "coordinator_registration_rejections_total",
            Unit::Count,
            "Register calls refused because every slot was taken"
        );
        describe_counter!(
            "coordinator_checkins_total",
            Unit::Count,
            "Heartbeats received per shard"
        );
        describe_counter!(
            "coordinator_evictions_total",
            Unit::Count,
            "Shards deregistered after missing their heartbeat"
        );
        describe_counter!(
            "coordinator_readmissions_total",
            Unit::Count,
            "Evicted shards re-admitted by a late checkin"
        );
        describe_counter!(
            "coordinator_guild_updates_total",
            Unit::Count,
            "Guild snapshots accepted per shard"
        );
        describe_counter!(
            "coordinator_errors_total",
            Unit::Count,
            "Coordinator errors by type"
        );

        describe_histogram!(
            "coordinator_sweep_duration_seconds",
            Unit::Seconds,
            "Time spent in one liveness sweep"
        );

        describe_gauge!(
            "coordinator_shards_registered",
            Unit::Count,
            "Shard slots currently registered"
        );
        describe_gauge!(
            "coordinator_guilds_total",
            Unit::Count,
            "Guilds across all stored snapshots"
        );
        describe_gauge!(
            "coordinator_users_total",
            Unit::Count,
            "Members across all stored snapshots"
        );
        describe_gauge!(
            "coordinator_nats_connected",
            Unit::Count,
            "NATS connection status (1=connected, 0=disconnected)"
        );
    }

    pub fn record_registration(&self) {
        counter!("coordinator_registrations_total").increment(1);
    }

    pub fn record_registration_rejected(&self) {
        counter!("coordinator_registration_rejections_total").increment(1);
    }

    pub fn record_checkin(&self, shard_id: u32) {
        counter!(
            "coordinator_checkins_total",
            "shard_id" => shard_id.to_string()
        )
        .increment(1);
    }

    pub fn record_eviction(&self, shard_id: u32) {
        counter!(
            "coordinator_evictions_total",
            "shard_id" => shard_id.to_string()
        )
        .increment(1);
    }

    pub fn record_readmission(&self, shard_id: u32) {
        counter!(
            "coordinator_readmissions_total",
            "shard_id" => shard_id.to_string()
        )
        .increment(1);
    }

    pub fn record_guild_update(&self, shard_id: u32) {
        counter!(
            "coordinator_guild_updates_total",
            "shard_id" => shard_id.to_string()
        )
        .increment(1);
    }

    /// Record an error by its `error_type_label`
    pub fn record_error(&self, error_type: &'static str) {
        counter!(
            "coordinator_errors_total",
            "error_type" => error_type
        )
        .increment(1);
    }

    pub fn record_sweep(&self, duration: Duration) {
        histogram!("coordinator_sweep_duration_seconds").record(duration.as_secs_f64());
    }

    pub fn set_shards_registered(&self, count: usize) {
        gauge!("coordinator_shards_registered").set(count as f64);
    }

    pub fn set_aggregate(&self, aggregate: Aggregate) {
        gauge!("coordinator_guilds_total").set(aggregate.guild_count as f64);
        gauge!("coordinator_users_total").set(aggregate.user_count as f64);
    }

    pub fn set_nats_connected(&self, connected: bool) {
        gauge!("coordinator_nats_connected").set(if connected { 1.0 } else { 0.0 });
    }

    /// Render metrics in Prometheus format
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

impl Default for CoordinatorMetrics {
    fn default() -> Self {
        Self::new()
    }
}
