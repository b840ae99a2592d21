use std::fmt;

use crate::{channel::OverflowPolicy, pipeline::Pipeline, scheduler::SharedScheduler};

/// Construction options for an [`EventManager`](crate::manager::EventManager).
///
/// ```rust
/// use rxbridge::prelude::*;
///
/// let config = ManagerConfig {
///   overflow: OverflowPolicy::DropOldest { capacity: 1024 },
///   dispose_on_shutdown: false,
///   ..ManagerConfig::default()
/// };
/// let manager = EventManager::with_config(config);
/// assert_eq!(manager.state(), LifecycleState::Active);
/// ```
#[derive(Clone)]
pub struct ManagerConfig {
  /// Per-subscriber overflow policy of the broadcast channel.
  pub overflow: OverflowPolicy,
  /// Complete the stream when the terminal event arrives.
  pub complete_on_shutdown: bool,
  /// Dispose the manager when the terminal event arrives.
  pub dispose_on_shutdown: bool,
  /// Keep a manager-owned subscription on the stream that traces every
  /// event.
  pub auto_subscribe: bool,
  /// Worker context for subscriber callbacks. `None` starts a dedicated
  /// thread that the manager owns and stops on disposal; a supplied
  /// scheduler is left running.
  pub scheduler: Option<SharedScheduler>,
  /// Thread name of the owned worker.
  pub worker_name: String,
  /// Stages every event passes on the producer thread.
  pub pipeline: Pipeline,
}

impl Default for ManagerConfig {
  fn default() -> Self {
    ManagerConfig {
      overflow: OverflowPolicy::default(),
      complete_on_shutdown: true,
      dispose_on_shutdown: true,
      auto_subscribe: true,
      scheduler: None,
      worker_name: "event-manager".to_owned(),
      pipeline: Pipeline::identity(),
    }
  }
}

impl fmt::Debug for ManagerConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ManagerConfig")
      .field("overflow", &self.overflow)
      .field("complete_on_shutdown", &self.complete_on_shutdown)
      .field("dispose_on_shutdown", &self.dispose_on_shutdown)
      .field("auto_subscribe", &self.auto_subscribe)
      .field("scheduler", &self.scheduler.as_ref().map(|_| "custom"))
      .field("worker_name", &self.worker_name)
      .field("pipeline", &self.pipeline)
      .finish()
  }
}
