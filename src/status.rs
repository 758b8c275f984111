use crate::job::JobId;
use crate::pool::PoolState;
use crate::slot::{SlotId, SlotStatus};

use std::fmt;
use std::sync::Arc;

/// Point-in-time view of one slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotReport {
  pub id: SlotId,
  pub status: SlotStatus,
  /// The job occupying the slot, if busy.
  pub job_id: Option<JobId>,
}

/// Snapshot returned by [`SlotPool::status`](crate::SlotPool::status).
#[derive(Debug, Clone)]
pub struct PoolStatus {
  pub pool_name: Arc<String>,
  pub state: PoolState,
  pub capacity: usize,
  pub slots: Vec<SlotReport>,
}

impl PoolStatus {
  pub fn busy_count(&self) -> usize {
    self.slots.iter().filter(|s| s.status == SlotStatus::Busy).count()
  }

  pub fn idle_count(&self) -> usize {
    self.slots.iter().filter(|s| s.status == SlotStatus::Idle).count()
  }

  pub fn is_quiescent(&self) -> bool {
    self.busy_count() == 0
  }

  /// Looks up a slot by its 1-based id.
  pub fn slot(&self, id: usize) -> Option<&SlotReport> {
    self.slots.iter().find(|s| s.id.get() == id)
  }
}

impl fmt::Display for PoolStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "STATUS ({}, {:?}, capacity {})", self.pool_name, self.state, self.capacity)?;
    for slot in &self.slots {
      writeln!(f, "Slot {} - {}", slot.id, slot.status)?;
    }
    write!(f, "END STATUS")
  }
}
