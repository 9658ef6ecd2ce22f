//! Shard Coordinator binary
//!
//! Serves the coordinator RPCs, health and metrics over HTTP while the
//! liveness monitor sweeps the registry in the background.

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info};

use shard_coordinator::api::{self, AppState};
use shard_coordinator::assets::AssetPublisher;
use shard_coordinator::metrics::CoordinatorMetrics;
use shard_coordinator::nats::{self, NatsPublisher};
use shard_coordinator::{Coordinator, CoordinatorConfig, LivenessMonitor};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first to get log level
    let config = CoordinatorConfig::from_env()?;

    // Initialize tracing with configured log level
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("shard_coordinator={}", config.log_level).parse()?)
                .add_directive("async_nats=warn".parse()?),
        )
        .json()
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        total_shards = config.total_shards,
        heartbeat_timeout_secs = config.heartbeat_timeout.as_secs(),
        sweep_period_secs = config.sweep_period.as_secs(),
        stale_policy = %config.stale_policy,
        "Starting Shard Coordinator"
    );

    let metrics = Arc::new(CoordinatorMetrics::new());
    info!("Prometheus metrics initialized");

    // Connect to NATS if configured
    let nats = if let Some(ref url) = config.nats_url {
        match NatsPublisher::connect(url).await {
            Ok(publisher) => {
                info!(url, "Connected to NATS");
                if let Err(e) = nats::ensure_streams(publisher.jetstream()).await {
                    error!(error = %e, "Failed to configure NATS streams - lifecycle events may be dropped");
                }
                metrics.set_nats_connected(true);
                Some(publisher)
            }
            Err(e) => {
                error!(error = %e, "Failed to connect to NATS - running in local mode");
                metrics.set_nats_connected(false);
                None
            }
        }
    } else {
        info!("No NATS_URL configured - running in local mode");
        None
    };

    let assets = AssetPublisher::new(config.asset_root.clone(), config.cdn_base_url.clone());
    let http_port = config.http_port;
    let coordinator = Coordinator::new(config, Arc::clone(&metrics), nats.clone());

    // Start liveness monitor
    let (shutdown_tx, _) = broadcast::channel(1);
    let monitor = LivenessMonitor::new(coordinator.clone()).spawn(shutdown_tx.subscribe());

    // Start RPC/health server
    let app = api::router(AppState {
        coordinator: coordinator.clone(),
        assets,
    });
    let addr: SocketAddr = ([0, 0, 0, 0], http_port).into();

    info!(port = http_port, "Starting HTTP server");

    let http_server = axum::serve(tokio::net::TcpListener::bind(addr).await?, app);

    tokio::select! {
        result = http_server => {
            if let Err(e) = result {
                error!(error = %e, "HTTP server error");
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    // Graceful shutdown
    info!("Shutting down coordinator...");

    let _ = shutdown_tx.send(());
    if let Err(e) = monitor.await {
        error!(error = %e, "Liveness monitor did not stop cleanly");
    }

    if let Some(ref nats) = nats {
        nats.close().await;
    }

    info!("Coordinator shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
