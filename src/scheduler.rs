//! Worker contexts
//!
//! A [`Scheduler`] is the execution context subscriber callbacks run on. The
//! producer thread only ever hands it a task and returns; it never waits for
//! the task to run.
//!
//! | Scheduler | Threads | Ordering across subscribers |
//! |-----------|---------|-----------------------------|
//! | [`ThreadPoolScheduler::single`] (default) | one dedicated thread | total order |
//! | [`ThreadPoolScheduler::pool`] | `n` threads | per subscriber only |
//! | [`InlineScheduler`] | the calling thread | total order |
//! | `TokioScheduler` (`tokio-scheduler` feature) | tokio blocking pool | per subscriber only |
//!
//! With a single worker a slow callback delays every other subscriber that
//! shares it. Use a pool when that matters more than a shared order.

use std::sync::Arc;

use crate::error::SchedulerError;

mod sync;
mod thread_pool_scheduler;
#[cfg(feature = "tokio-scheduler")]
mod tokio_scheduler;

pub use sync::InlineScheduler;
pub use thread_pool_scheduler::ThreadPoolScheduler;
#[cfg(feature = "tokio-scheduler")]
pub use tokio_scheduler::TokioScheduler;

/// A unit of work handed to a scheduler.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Scheduler shared between the manager, its channel and its subscriptions.
pub type SharedScheduler = Arc<dyn Scheduler>;

/// An execution context that runs tasks off the producer thread.
pub trait Scheduler: Send + Sync {
  /// Queue `task` for execution. Must not block on the task itself.
  fn spawn(&self, task: Task) -> Result<(), SchedulerError>;

  /// Stop accepting new work. Tasks already queued still run.
  /// Calling it more than once has no further effect.
  fn dispose(&self);

  fn is_disposed(&self) -> bool;
}

/// Run a task, keeping a panic inside it from tearing down the worker thread.
pub(crate) fn run_isolated(task: Task) {
  if let Err(payload) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(task)) {
    tracing::error!(
      panic = %crate::error::panic_message(payload.as_ref()),
      "scheduled task panicked"
    );
  }
}
