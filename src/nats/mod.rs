//! NATS JetStream integration
//!
//! Publishes shard lifecycle events so downstream services can react to
//! registrations and evictions without polling the coordinator.

mod publisher;

pub use publisher::{ensure_streams, route_event, NatsPublisher};
