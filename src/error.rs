use thiserror::Error;

/// Errors that can occur within the `slot_pool` pool.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
  #[error("Failed to allocate a pool of {capacity} slots: {reason}")]
  Allocation { capacity: usize, reason: String },

  #[error("Pool is shutting down or already shut down, cannot accept new jobs")]
  PoolShuttingDown,
}

impl PoolError {
  pub(crate) fn allocation(capacity: usize, reason: impl Into<String>) -> Self {
    PoolError::Allocation {
      capacity,
      reason: reason.into(),
    }
  }
}
