use std::sync::atomic::{AtomicBool, Ordering};

use tokio::runtime::Handle;

use super::{run_isolated, Scheduler, Task};
use crate::error::SchedulerError;

/// Runs callbacks on a tokio runtime's blocking pool.
///
/// Callbacks are synchronous and may block, so they never go onto the async
/// worker threads. Drains of different subscribers can run concurrently.
#[derive(Debug)]
pub struct TokioScheduler {
  handle: Handle,
  disposed: AtomicBool,
}

impl TokioScheduler {
  pub fn new(handle: Handle) -> Self { TokioScheduler { handle, disposed: AtomicBool::new(false) } }

  /// Uses the runtime the caller is currently running on.
  ///
  /// # Panics
  ///
  /// Panics when called outside of a tokio runtime.
  pub fn current() -> Self { Self::new(Handle::current()) }
}

impl Scheduler for TokioScheduler {
  fn spawn(&self, task: Task) -> Result<(), SchedulerError> {
    if self.is_disposed() {
      return Err(SchedulerError::Disposed);
    }
    self.handle.spawn_blocking(move || run_isolated(task));
    Ok(())
  }

  fn dispose(&self) { self.disposed.store(true, Ordering::Release); }

  fn is_disposed(&self) -> bool { self.disposed.load(Ordering::Acquire) }
}
