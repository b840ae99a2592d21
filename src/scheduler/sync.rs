use std::sync::atomic::{AtomicBool, Ordering};

use super::{run_isolated, Scheduler, Task};
use crate::error::SchedulerError;

/// Runs every task immediately on the thread that spawns it.
///
/// Callbacks then execute on the producer thread, which gives up the
/// guarantee that a slow subscriber cannot delay delivery. Meant for
/// deterministic tests and consumers that only record events.
#[derive(Debug, Default)]
pub struct InlineScheduler {
  disposed: AtomicBool,
}

impl InlineScheduler {
  pub fn new() -> Self { Self::default() }
}

impl Scheduler for InlineScheduler {
  fn spawn(&self, task: Task) -> Result<(), SchedulerError> {
    if self.is_disposed() {
      return Err(SchedulerError::Disposed);
    }
    run_isolated(task);
    Ok(())
  }

  fn dispose(&self) { self.disposed.store(true, Ordering::Release); }

  fn is_disposed(&self) -> bool { self.disposed.load(Ordering::Acquire) }
}

#[cfg(test)]
mod test {
  use std::sync::{Arc, Mutex};

  use super::*;

  #[test]
  fn runs_in_place() {
    let scheduler = InlineScheduler::new();
    let hits = Arc::new(Mutex::new(0));
    let c_hits = hits.clone();
    scheduler.spawn(Box::new(move || *c_hits.lock().unwrap() += 1)).unwrap();
    assert_eq!(*hits.lock().unwrap(), 1);

    scheduler.dispose();
    assert_eq!(scheduler.spawn(Box::new(|| {})), Err(SchedulerError::Disposed));
  }
}
