use std::sync::{
  atomic::{AtomicBool, Ordering},
  Mutex,
};

use futures::{executor::ThreadPool, future};

use super::{run_isolated, Scheduler, Task};
use crate::{error::SchedulerError, rc::lock};

/// Scheduler backed by a `futures` thread pool.
///
/// The threads are started lazily on the first spawned task, so a manager
/// that never gets a subscriber never owns a thread.
pub struct ThreadPoolScheduler {
  name: String,
  size: usize,
  pool: Mutex<PoolSlot>,
  disposed: AtomicBool,
}

enum PoolSlot {
  Idle,
  Running(ThreadPool),
  Disposed,
}

impl ThreadPoolScheduler {
  /// A single dedicated worker thread named `{name}-0`.
  pub fn single(name: impl Into<String>) -> Self { Self::pool(name, 1) }

  /// A pool of `size` worker threads named `{name}-{index}`.
  pub fn pool(name: impl Into<String>, size: usize) -> Self {
    ThreadPoolScheduler {
      name: name.into(),
      size: size.max(1),
      pool: Mutex::new(PoolSlot::Idle),
      disposed: AtomicBool::new(false),
    }
  }

  pub fn name(&self) -> &str { &self.name }

  pub fn size(&self) -> usize { self.size }

  fn start(&self) -> Result<ThreadPool, SchedulerError> {
    tracing::debug!(name = %self.name, size = self.size, "starting scheduler threads");
    ThreadPool::builder()
      .pool_size(self.size)
      .name_prefix(format!("{}-", self.name))
      .create()
      .map_err(|err| SchedulerError::Spawn(err.to_string()))
  }
}

impl Scheduler for ThreadPoolScheduler {
  fn spawn(&self, task: Task) -> Result<(), SchedulerError> {
    let mut slot = lock(&self.pool);
    let pool = match &*slot {
      PoolSlot::Running(pool) => pool.clone(),
      PoolSlot::Disposed => return Err(SchedulerError::Disposed),
      PoolSlot::Idle => {
        let pool = self.start()?;
        *slot = PoolSlot::Running(pool.clone());
        pool
      }
    };
    drop(slot);
    pool.spawn_ok(future::lazy(move |_| run_isolated(task)));
    Ok(())
  }

  fn dispose(&self) {
    if self.disposed.swap(true, Ordering::AcqRel) {
      return;
    }
    // Dropping the last pool handle lets the threads exit once the tasks
    // queued before this point have run.
    let previous = std::mem::replace(&mut *lock(&self.pool), PoolSlot::Disposed);
    drop(previous);
    tracing::debug!(name = %self.name, "scheduler disposed");
  }

  fn is_disposed(&self) -> bool { self.disposed.load(Ordering::Acquire) }
}

impl std::fmt::Debug for ThreadPoolScheduler {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ThreadPoolScheduler")
      .field("name", &self.name)
      .field("size", &self.size)
      .field("disposed", &self.is_disposed())
      .finish()
  }
}
