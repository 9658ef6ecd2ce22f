//! Shard identity and liveness management
//!
//! The registry owns slot state; the monitor drives periodic eviction.

mod monitor;
mod registry;

pub use monitor::{LivenessMonitor, SweepTarget};
pub use registry::{Heartbeat, ShardRegistry, ShardSlot};
