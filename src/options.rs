use std::time::Duration;

use tokio::runtime::Handle as TokioHandle;

/// Default rescan interval for a dispatch waiting on a free slot.
pub const DEFAULT_DISPATCH_RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// Default rescan interval while draining the pool.
pub const DEFAULT_DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Configuration for a [`SlotPool`](crate::SlotPool).
///
/// Slot releases wake waiting dispatches and drains immediately; the two
/// intervals only bound how long a waiter can go without rescanning.
#[derive(Debug, Clone)]
pub struct PoolOptions {
  pub(crate) pool_name: String,
  pub(crate) capacity: usize,
  pub(crate) tokio_handle: Option<TokioHandle>,
  pub(crate) dispatch_retry_interval: Duration,
  pub(crate) drain_poll_interval: Duration,
}

impl PoolOptions {
  pub fn new(pool_name: &str, capacity: usize) -> Self {
    Self {
      pool_name: pool_name.to_string(),
      capacity,
      tokio_handle: None,
      dispatch_retry_interval: DEFAULT_DISPATCH_RETRY_INTERVAL,
      drain_poll_interval: DEFAULT_DRAIN_POLL_INTERVAL,
    }
  }

  /// Runtime the jobs are spawned on. Defaults to the runtime that calls
  /// `SlotPool::create`.
  pub fn tokio_handle(mut self, handle: TokioHandle) -> Self {
    self.tokio_handle = Some(handle);
    self
  }

  pub fn dispatch_retry_interval(mut self, interval: Duration) -> Self {
    self.dispatch_retry_interval = interval;
    self
  }

  pub fn drain_poll_interval(mut self, interval: Duration) -> Self {
    self.drain_poll_interval = interval;
    self
  }

  pub fn pool_name(&self) -> &str {
    &self.pool_name
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }
}
