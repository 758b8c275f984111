use crate::slot::SlotId;

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};

/// The future a job produces once it has been handed its slot and context.
/// It must be `Send` and `'static`; its output is discarded.
pub(crate) type JobFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// A job erased to a single boxed type, ready to be bound to a slot.
pub(crate) type BoxedJob = Box<dyn FnOnce(SlotId) -> JobFuture + Send + 'static>;

/// Identifier attached to every dispatched job, for tracing only.
pub type JobId = u64;

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(0);

pub(crate) fn next_job_id() -> JobId {
  NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed)
}

/// Binds a caller's job to its context so the pool only ever deals with one
/// boxed shape. The context is moved into the job and never touched by the
/// pool afterwards.
pub(crate) fn bind<C, F, Fut>(job: F, context: C) -> BoxedJob
where
  C: Send + 'static,
  F: FnOnce(SlotId, C) -> Fut + Send + 'static,
  Fut: Future<Output = ()> + Send + 'static,
{
  Box::new(move |slot_id: SlotId| -> JobFuture { Box::pin(job(slot_id, context)) })
}
