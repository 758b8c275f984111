use crate::error::PoolError;
use crate::job::JobId;

use std::fmt;

use tokio::task::JoinHandle;

/// Stable identity of a slot, assigned at allocation time (1..=capacity).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotId(usize);

impl SlotId {
  pub(crate) fn new(id: usize) -> Self {
    SlotId(id)
  }

  /// Returns the 1-based numeric id.
  pub fn get(&self) -> usize {
    self.0
  }

  fn index(&self) -> usize {
    self.0 - 1
  }
}

impl fmt::Display for SlotId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus {
  Idle,
  Busy,
}

impl fmt::Display for SlotStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      SlotStatus::Idle => f.write_str("IDLE"),
      SlotStatus::Busy => f.write_str("BUSY"),
    }
  }
}

/// Work currently occupying a slot. Present only while the slot is busy.
/// `handle` is attached right after the job's task is spawned.
#[derive(Debug)]
pub(crate) struct Occupant {
  pub(crate) job_id: JobId,
  pub(crate) handle: Option<JoinHandle<()>>,
}

#[derive(Debug)]
pub(crate) struct Slot {
  id: SlotId,
  occupant: Option<Occupant>,
}

impl Slot {
  pub(crate) fn id(&self) -> SlotId {
    self.id
  }

  pub(crate) fn status(&self) -> SlotStatus {
    if self.occupant.is_some() {
      SlotStatus::Busy
    } else {
      SlotStatus::Idle
    }
  }

  pub(crate) fn job_id(&self) -> Option<JobId> {
    self.occupant.as_ref().map(|o| o.job_id)
  }

  #[cfg(test)]
  pub(crate) fn has_handle(&self) -> bool {
    self.occupant.as_ref().is_some_and(|o| o.handle.is_some())
  }
}

/// The fixed set of slots owned by one pool.
///
/// The registry does no locking of its own. The pool keeps it behind a single
/// mutex and every mutating method takes `&mut self`, so a caller can only
/// claim or release a slot while holding that lock.
#[derive(Debug)]
pub(crate) struct SlotRegistry {
  capacity: usize,
  slots: Vec<Slot>,
}

impl SlotRegistry {
  /// Allocates `capacity` idle slots with ids `1..=capacity`.
  pub(crate) fn allocate(capacity: usize) -> Result<Self, PoolError> {
    if capacity == 0 {
      return Err(PoolError::allocation(capacity, "capacity must be greater than zero"));
    }

    let mut slots = Vec::new();
    slots
      .try_reserve_exact(capacity)
      .map_err(|e| PoolError::allocation(capacity, e.to_string()))?;
    slots.extend((1..=capacity).map(|id| Slot {
      id: SlotId::new(id),
      occupant: None,
    }));

    Ok(Self { capacity, slots })
  }

  pub(crate) fn capacity(&self) -> usize {
    self.capacity
  }

  pub(crate) fn slots(&self) -> &[Slot] {
    &self.slots
  }

  /// Lowest-id idle slot, if any. Does not claim it.
  pub(crate) fn find_idle(&self) -> Option<SlotId> {
    self.slots.iter().find(|s| s.occupant.is_none()).map(|s| s.id)
  }

  /// Claims `id` for `job_id`. The slot must be idle.
  pub(crate) fn mark_busy(&mut self, id: SlotId, job_id: JobId) {
    let slot = &mut self.slots[id.index()];
    debug_assert!(slot.occupant.is_none(), "slot {} claimed while busy", id);
    slot.occupant = Some(Occupant { job_id, handle: None });
  }

  /// Stores the task handle of `job_id` on its slot. If the job has already
  /// released the slot the handle is dropped and `false` is returned.
  pub(crate) fn attach_handle(&mut self, id: SlotId, job_id: JobId, handle: JoinHandle<()>) -> bool {
    match self.slots.get_mut(id.index()).and_then(|slot| slot.occupant.as_mut()) {
      Some(occupant) if occupant.job_id == job_id => {
        occupant.handle = Some(handle);
        true
      }
      _ => false,
    }
  }

  /// Returns `id` to idle, detaching the stored handle. Returns the job that
  /// was occupying it.
  pub(crate) fn mark_idle(&mut self, id: SlotId) -> Option<JobId> {
    self
      .slots
      .get_mut(id.index())
      .and_then(|slot| slot.occupant.take())
      .map(|Occupant { job_id, handle }| {
        // Detaches; the task keeps running to completion if it has not yet.
        drop(handle);
        job_id
      })
  }

  pub(crate) fn busy_count(&self) -> usize {
    self.slots.iter().filter(|s| s.occupant.is_some()).count()
  }

  pub(crate) fn is_quiescent(&self) -> bool {
    self.slots.iter().all(|s| s.occupant.is_none())
  }

  /// Drops the storage for every slot. The pool must already be quiescent.
  pub(crate) fn release(&mut self) {
    debug_assert!(self.is_quiescent(), "slot storage released while a slot is busy");
    self.slots = Vec::new();
  }

  pub(crate) fn is_released(&self) -> bool {
    self.slots.is_empty()
  }
}
