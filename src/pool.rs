use crate::error::PoolError;
use crate::job::{self, BoxedJob, JobId};
use crate::options::PoolOptions;
use crate::slot::{SlotId, SlotRegistry};
use crate::status::{PoolStatus, SlotReport};

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::runtime::Handle as TokioHandle;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, trace, warn, Instrument};

/// Lifecycle of a pool. A pool never leaves `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
  /// Accepting dispatches.
  Running,
  /// Teardown has begun: dispatches are rejected, running jobs finish.
  Draining,
  /// Quiescent and slot storage released.
  Stopped,
}

/// Everything guarded by the pool-wide lock.
#[derive(Debug)]
struct PoolCore {
  state: PoolState,
  registry: SlotRegistry,
}

/// A fixed set of execution slots onto which jobs are dispatched.
///
/// Each job runs as its own Tokio task. A slot is busy from the moment it is
/// claimed until the job's future finishes (or panics), at which point the
/// pool itself returns the slot to idle and wakes anyone waiting for one.
///
/// Context handed to a job is owned by that job. Context shared between
/// concurrently running jobs (an `Arc<Mutex<_>>`, an atomic) must bring its
/// own synchronization; the pool lock only covers slot state.
pub struct SlotPool {
  pool_name: Arc<String>,
  capacity: usize,
  core: Arc<Mutex<PoolCore>>,
  slot_released: Arc<Notify>,
  draining_token: CancellationToken,
  tokio_handle: TokioHandle,
  dispatch_retry_interval: Duration,
  drain_poll_interval: Duration,
}

impl fmt::Debug for SlotPool {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let core = self.core.lock();
    f.debug_struct("SlotPool")
      .field("pool_name", &self.pool_name)
      .field("capacity", &self.capacity)
      .field("state", &core.state)
      .field("busy", &core.registry.busy_count())
      .field("released", &core.registry.is_released())
      .finish_non_exhaustive()
  }
}

impl SlotPool {
  /// Allocates a pool of `options.capacity()` idle slots.
  ///
  /// # Errors
  /// Returns `PoolError::Allocation` if the capacity is zero, the slot storage
  /// cannot be reserved, or no Tokio runtime is available to run jobs on.
  pub fn create(options: PoolOptions) -> Result<Arc<Self>, PoolError> {
    let PoolOptions {
      pool_name,
      capacity,
      tokio_handle,
      dispatch_retry_interval,
      drain_poll_interval,
    } = options;

    let registry = SlotRegistry::allocate(capacity).map_err(|e| {
      error!(%pool_name, %capacity, "Failed to allocate slot registry: {}", e);
      e
    })?;

    let tokio_handle = match tokio_handle {
      Some(handle) => handle,
      None => TokioHandle::try_current().map_err(|e| {
        error!(%pool_name, "No Tokio runtime available for pool jobs: {}", e);
        PoolError::allocation(capacity, format!("no Tokio runtime available: {}", e))
      })?,
    };

    let pool = Arc::new(Self {
      pool_name: Arc::new(pool_name),
      capacity: registry.capacity(),
      core: Arc::new(Mutex::new(PoolCore {
        state: PoolState::Running,
        registry,
      })),
      slot_released: Arc::new(Notify::new()),
      draining_token: CancellationToken::new(),
      tokio_handle,
      dispatch_retry_interval,
      drain_poll_interval,
    });

    info!(pool_name = %pool.pool_name, %capacity, "Pool ready.");
    Ok(pool)
  }

  /// Allocates a pool and immediately hands `job` and `context` to the first
  /// slot. Returns once the pool is ready; the job runs independently.
  pub fn create_with_job<C, F, Fut>(options: PoolOptions, job: F, context: C) -> Result<Arc<Self>, PoolError>
  where
    C: Send + 'static,
    F: FnOnce(SlotId, C) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
  {
    let pool = Self::create(options)?;
    let job_id = job::next_job_id();
    match pool.try_claim(job_id, job::bind(job, context))? {
      Ok(slot_id) => {
        debug!(pool_name = %pool.pool_name, %slot_id, %job_id, "Initial job dispatched.");
      }
      Err(_unclaimed) => {
        error!(pool_name = %pool.pool_name, %job_id, "No idle slot for the initial job in a fresh pool.");
        return Err(PoolError::allocation(pool.capacity, "no idle slot for the initial job"));
      }
    }
    Ok(pool)
  }

  pub fn name(&self) -> &str {
    &self.pool_name
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  pub fn state(&self) -> PoolState {
    self.core.lock().state
  }

  pub fn busy_count(&self) -> usize {
    self.core.lock().registry.busy_count()
  }

  pub fn idle_count(&self) -> usize {
    let core = self.core.lock();
    core.registry.slots().len() - core.registry.busy_count()
  }

  /// Hands `job` and `context` to the lowest-id idle slot and returns that
  /// slot's id as soon as the job has been launched.
  ///
  /// If every slot is busy this waits until one is released. It does not time
  /// out: under permanent saturation (or a job that never finishes) it waits
  /// forever.
  ///
  /// # Errors
  /// Returns `PoolError::PoolShuttingDown` if teardown has begun, including
  /// while this call was waiting for a slot. The job is dropped unrun.
  pub async fn dispatch<C, F, Fut>(&self, job: F, context: C) -> Result<SlotId, PoolError>
  where
    C: Send + 'static,
    F: FnOnce(SlotId, C) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
  {
    let job_id = job::next_job_id();
    let mut job = job::bind(job, context);

    loop {
      let released = self.slot_released.notified();
      tokio::pin!(released);
      // Register before scanning so a release between the scan and the await
      // is not missed.
      released.as_mut().enable();

      job = match self.try_claim(job_id, job)? {
        Ok(slot_id) => return Ok(slot_id),
        Err(unclaimed) => unclaimed,
      };

      trace!(pool_name = %self.pool_name, %job_id, "Dispatch: all slots busy, waiting for a release.");
      tokio::select! {
        biased;
        _ = self.draining_token.cancelled() => {}
        _ = &mut released => {}
        _ = tokio::time::sleep(self.dispatch_retry_interval) => {}
      }
    }
  }

  /// Scans for an idle slot and, if one exists, claims it under the pool lock,
  /// then launches the job. Hands the job back when every slot is busy.
  fn try_claim(&self, job_id: JobId, job: BoxedJob) -> Result<Result<SlotId, BoxedJob>, PoolError> {
    let (slot_id, lease) = {
      let mut core = self.core.lock();
      if core.state != PoolState::Running {
        warn!(pool_name = %self.pool_name, %job_id, state = ?core.state, "Dispatch rejected: pool is shutting down.");
        return Err(PoolError::PoolShuttingDown);
      }

      let slot_id = match core.registry.find_idle() {
        Some(id) => id,
        None => return Ok(Err(job)),
      };
      core.registry.mark_busy(slot_id, job_id);
      debug!(
        pool_name = %self.pool_name,
        %slot_id,
        %job_id,
        busy = core.registry.busy_count(),
        "Slot claimed for job."
      );

      let lease = SlotLease {
        core: self.core.clone(),
        slot_released: self.slot_released.clone(),
        pool_name: self.pool_name.clone(),
        slot_id,
        job_id,
      };
      (slot_id, lease)
    };

    // The lock is not held here: a runtime that is already shut down drops
    // the task, and with it the lease, inside `spawn`.
    let handle = self.spawn_job(lease, job);

    let attached = self.core.lock().registry.attach_handle(slot_id, job_id, handle);
    if !attached {
      trace!(pool_name = %self.pool_name, %slot_id, %job_id, "Job released its slot before its handle was attached.");
    }
    Ok(Ok(slot_id))
  }

  fn spawn_job(&self, lease: SlotLease, job: BoxedJob) -> tokio::task::JoinHandle<()> {
    let slot_id = lease.slot_id;
    let job_id = lease.job_id;
    let pool_name_for_execution = self.pool_name.clone();
    let pool_name_for_span = self.pool_name.clone();

    self.tokio_handle.spawn(
      async move {
        // Owned by the future from the start, so the slot is released even if
        // the task is dropped before it is ever polled.
        let _lease = lease;

        match AssertUnwindSafe(async move { job(slot_id).await }).catch_unwind().await {
          Ok(()) => {
            trace!(pool_name = %*pool_name_for_execution, %slot_id, %job_id, "Job finished.");
          }
          Err(_panic_payload) => {
            error!(pool_name = %*pool_name_for_execution, %slot_id, %job_id, "Job panicked during execution.");
          }
        }
      }
      .instrument(info_span!(
        "slot_job",
        pool_name = %*pool_name_for_span,
        %slot_id,
        %job_id
      )),
    )
  }

  /// Takes a snapshot of every slot's id and status. Read-only.
  pub fn status(&self) -> PoolStatus {
    let core = self.core.lock();
    let slots = core
      .registry
      .slots()
      .iter()
      .map(|slot| SlotReport {
        id: slot.id(),
        status: slot.status(),
        job_id: slot.job_id(),
      })
      .collect();

    PoolStatus {
      pool_name: self.pool_name.clone(),
      state: core.state,
      capacity: self.capacity,
      slots,
    }
  }

  /// Waits until every slot is idle at the same time. Does not stop the pool;
  /// dispatches racing with this call may make it wait longer.
  pub async fn wait_idle(&self) {
    loop {
      let released = self.slot_released.notified();
      tokio::pin!(released);
      released.as_mut().enable();

      let quiescent = self.core.lock().registry.is_quiescent();
      if quiescent {
        return;
      }

      trace!(pool_name = %self.pool_name, "Waiting for busy slots to be released.");
      tokio::select! {
        _ = &mut released => {}
        _ = tokio::time::sleep(self.drain_poll_interval) => {}
      }
    }
  }

  /// Stops accepting jobs, waits for every running job to finish, then
  /// releases the slot storage.
  ///
  /// Dispatches issued after this call starts, and dispatches already waiting
  /// for a slot, fail with `PoolError::PoolShuttingDown`. A job that never
  /// finishes makes this wait forever. Calling it again, concurrently or
  /// after completion, waits for the same outcome and returns `Ok(())`.
  pub async fn teardown(self: Arc<Self>) -> Result<(), PoolError> {
    let (already_draining, busy) = {
      let mut core = self.core.lock();
      let busy = core.registry.busy_count();
      match core.state {
        PoolState::Running => {
          core.state = PoolState::Draining;
          (false, busy)
        }
        PoolState::Draining | PoolState::Stopped => (true, busy),
      }
    };

    if !already_draining {
      info!(pool_name = %self.pool_name, %busy, "Initiating pool teardown.");
      self.draining_token.cancel();
    } else {
      info!(pool_name = %self.pool_name, "Teardown already in progress or completed.");
    }

    self.wait_idle().await;

    let mut core = self.core.lock();
    if core.state != PoolState::Stopped {
      core.registry.release();
      core.state = PoolState::Stopped;
      info!(pool_name = %self.pool_name, "Pool quiescent, slots released and stopped.");
    } else {
      trace!(pool_name = %self.pool_name, "Teardown: pool was already stopped.");
    }
    Ok(())
  }
}

impl Drop for SlotPool {
  fn drop(&mut self) {
    let mut core = self.core.lock();
    if core.state == PoolState::Running {
      info!(
        pool_name = %*self.pool_name,
        busy = core.registry.busy_count(),
        "SlotPool dropped without teardown. Draining implicitly; running jobs will finish on their own."
      );
      core.state = PoolState::Draining;
      self.draining_token.cancel();
    } else {
      trace!(pool_name = %*self.pool_name, state = ?core.state, "Drop: pool already draining or stopped.");
    }
  }
}

/// Held by a running job's task. Dropping it, whether the job finished,
/// panicked, or the task was torn down with its runtime, returns the slot to
/// idle and wakes waiters.
struct SlotLease {
  core: Arc<Mutex<PoolCore>>,
  slot_released: Arc<Notify>,
  pool_name: Arc<String>,
  slot_id: SlotId,
  job_id: JobId,
}

impl Drop for SlotLease {
  fn drop(&mut self) {
    let (released, busy) = {
      let mut core = self.core.lock();
      let released = core.registry.mark_idle(self.slot_id);
      (released, core.registry.busy_count())
    };
    debug_assert_eq!(released, Some(self.job_id), "slot {} released by a job that did not own it", self.slot_id);
    self.slot_released.notify_waiters();
    debug!(
      pool_name = %*self.pool_name,
      slot_id = %self.slot_id,
      job_id = %self.job_id,
      %busy,
      "Slot released."
    );
  }
}
