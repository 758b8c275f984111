//! A Tokio-based fixed-capacity slot pool: dispatch jobs carrying owned
//! context onto a bounded set of execution slots, inspect slot status, and
//! drain the pool gracefully.

mod error;
mod job;
mod options;
mod pool;
mod slot;
mod status;

pub use error::PoolError;
pub use job::JobId;
pub use options::{PoolOptions, DEFAULT_DISPATCH_RETRY_INTERVAL, DEFAULT_DRAIN_POLL_INTERVAL};
pub use pool::{PoolState, SlotPool};
pub use slot::{SlotId, SlotStatus};
pub use status::{PoolStatus, SlotReport};
