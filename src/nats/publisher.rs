//! NATS lifecycle event publisher
//!
//! Publishes shard lifecycle envelopes to the `SHARDS` JetStream stream.

use crate::error::CoordinatorError;
use crate::events::serialize::CoordinatorEvent;
use async_nats::jetstream::{self, Context as JsContext};
use async_nats::Client;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Stream names
pub mod streams {
    /// Shard lifecycle stream
    pub const SHARDS: &str = "SHARDS";
}

/// Subject prefixes for routing
pub mod subjects {
    /// Lifecycle events: shards.{transition}
    pub const SHARDS: &str = "shards";
}

/// NATS publisher for lifecycle events
pub struct NatsPublisher {
    client: Client,
    jetstream: JsContext,
    connected: AtomicBool,
}

impl NatsPublisher {
    /// Connect to NATS server
    pub async fn connect(servers: &str) -> Result<Arc<Self>, CoordinatorError> {
        info!(servers, "Connecting to NATS");

        let client = async_nats::connect(servers)
            .await
            .map_err(|e| CoordinatorError::NatsConnectionFailed(Box::new(e)))?;

        let jetstream = jetstream::new(client.clone());

        info!("Connected to NATS JetStream");

        Ok(Arc::new(Self {
            client,
            jetstream,
            connected: AtomicBool::new(true),
        }))
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
            && self.client.connection_state() == async_nats::connection::State::Connected
    }

    /// JetStream context (used for stream setup)
    pub fn jetstream(&self) -> &JsContext {
        &self.jetstream
    }

    /// Publish a lifecycle event and wait for the JetStream ack
    pub async fn publish_event(&self, event: &CoordinatorEvent) -> Result<(), CoordinatorError> {
        let subject = route_event(&event.event_type);
        let payload = serde_json::to_vec(event).map_err(|source| CoordinatorError::SerializationFailed {
            event_type: event.event_type.clone(),
            source,
        })?;

        debug!(
            event_type = %event.event_type,
            subject,
            event_id = %event.event_id,
            "Publishing event"
        );

        let published = async {
            let ack = self
                .jetstream
                .publish(subject.clone(), payload.into())
                .await?
                .await?;
            Ok::<_, async_nats::jetstream::context::PublishError>(ack)
        }
        .await;

        match published {
            Ok(ack) => {
                debug!(
                    subject,
                    stream = %ack.stream,
                    seq = ack.sequence,
                    "Event published"
                );
                Ok(())
            }
            Err(e) => {
                warn!(subject, error = %e, "Failed to publish event");
                Err(CoordinatorError::NatsPublishFailed {
                    subject,
                    source: Box::new(e),
                })
            }
        }
    }

    /// Graceful shutdown
    pub async fn close(&self) {
        info!("Closing NATS connection");
        self.connected.store(false, Ordering::SeqCst);
        if let Err(e) = self.client.flush().await {
            warn!(error = %e, "Failed to flush NATS client on close");
        }
    }
}

/// Route an event type to its subject
pub fn route_event(event_type: &str) -> String {
    match event_type {
        "shard.registered" => format!("{}.registered", subjects::SHARDS),
        "shard.readmitted" => format!("{}.readmitted", subjects::SHARDS),
        "shard.evicted" => format!("{}.evicted", subjects::SHARDS),
        "guilds.updated" => format!("{}.guilds", subjects::SHARDS),
        _ => format!("{}.other", subjects::SHARDS),
    }
}

/// Ensure the lifecycle stream exists with the expected configuration
pub async fn ensure_streams(js: &JsContext) -> Result<(), CoordinatorError> {
    use async_nats::jetstream::stream::{Config, RetentionPolicy, StorageType};

    // SHARDS stream - memory storage, 5min retention; consumers only care about recent transitions
    let shards_config = Config {
        name: streams::SHARDS.to_string(),
        subjects: vec![format!("{}.>", subjects::SHARDS)],
        retention: RetentionPolicy::Limits,
        max_age: Duration::from_secs(300),
        storage: StorageType::Memory,
        ..Default::default()
    };

    js.get_or_create_stream(shards_config)
        .await
        .map_err(|e| CoordinatorError::NatsConnectionFailed(Box::new(e)))?;

    info!(stream = streams::SHARDS, "NATS stream configured");
    Ok(())
}
