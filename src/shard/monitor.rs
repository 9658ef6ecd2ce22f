//! Liveness monitor
//!
//! Periodically sweeps the registry through the coordinator's write path and
//! deregisters shards that stopped checking in.

use crate::coordinator::Coordinator;
use std::future::Future;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Something the monitor can sweep on every tick
pub trait SweepTarget: Clone + Send + Sync + 'static {
    /// Evict expired shards, returning their ids
    fn sweep(&self) -> impl Future<Output = Vec<u32>> + Send;

    /// Called after a sweep task panicked or was cancelled
    fn sweep_failed(&self) {}
}

impl SweepTarget for Coordinator {
    async fn sweep(&self) -> Vec<u32> {
        self.sweep_expired().await
    }

    fn sweep_failed(&self) {
        self.metrics().record_error("sweep_failed");
    }
}

/// Background sweep loop
pub struct LivenessMonitor<T = Coordinator> {
    target: T,
    period: Duration,
}

impl LivenessMonitor {
    pub fn new(coordinator: Coordinator) -> Self {
        let period = coordinator.config().sweep_period;
        Self::with_target(coordinator, period)
    }
}

impl<T: SweepTarget> LivenessMonitor<T> {
    pub fn with_target(target: T, period: Duration) -> Self {
        Self { target, period }
    }

    /// Sweep on every tick until `shutdown` fires
    ///
    /// Each sweep runs in its own task; a sweep that panics is logged and
    /// the next tick sweeps again.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately; nothing can be stale yet
        ticker.tick().await;

        info!(period_secs = self.period.as_secs_f64(), "Liveness monitor started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.recv() => {
                    info!("Liveness monitor received shutdown signal");
                    return;
                }
            }

            let target = self.target.clone();
            match tokio::spawn(async move { target.sweep().await }).await {
                Ok(evicted) if evicted.is_empty() => debug!("Sweep found no stale shards"),
                Ok(evicted) => debug!(evicted = ?evicted, "Sweep complete"),
                Err(e) => {
                    self.target.sweep_failed();
                    error!(error = %e, "Liveness sweep failed, retrying next tick");
                }
            }
        }
    }

    /// Spawn [`run`](Self::run) onto the runtime
    pub fn spawn(self, shutdown: broadcast::Receiver<()>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
