//! Event handling module
//!
//! Provides lifecycle event serialization and routing to the message broker.

pub mod serialize;

pub use serialize::{serialize_lifecycle, CoordinatorEvent, ShardLifecycle};
