use std::sync::{
  atomic::{AtomicU8, Ordering},
  Mutex,
};

use crate::{channel::EventSubscription, rc::lock, subscription::Subscription};

/// Where a manager is in its one-way life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum LifecycleState {
  Active = 0,
  /// The stream has been completed; the manager has not been disposed yet.
  Completing = 1,
  Disposed = 2,
}

impl LifecycleState {
  fn from_u8(v: u8) -> Self {
    match v {
      0 => LifecycleState::Active,
      1 => LifecycleState::Completing,
      _ => LifecycleState::Disposed,
    }
  }
}

/// Owns the primary subscription and the `Active → Completing → Disposed`
/// state machine. Transitions never go backwards.
pub(crate) struct Lifecycle {
  state: AtomicU8,
  primary: Mutex<Option<EventSubscription>>,
}

impl Lifecycle {
  pub(crate) fn new(primary: Option<EventSubscription>) -> Self {
    Lifecycle { state: AtomicU8::new(LifecycleState::Active as u8), primary: Mutex::new(primary) }
  }

  #[inline]
  pub(crate) fn state(&self) -> LifecycleState { LifecycleState::from_u8(self.state.load(Ordering::Acquire)) }

  /// `Active → Completing`. Returns whether this call made the move.
  pub(crate) fn begin_completing(&self) -> bool {
    self
      .state
      .compare_exchange(
        LifecycleState::Active as u8,
        LifecycleState::Completing as u8,
        Ordering::AcqRel,
        Ordering::Acquire,
      )
      .is_ok()
  }

  /// Move to `Disposed` and cancel the primary subscription. Returns `false`
  /// if the lifecycle was already disposed.
  pub(crate) fn dispose(&self) -> bool {
    let previous = self.state.swap(LifecycleState::Disposed as u8, Ordering::AcqRel);
    if previous == LifecycleState::Disposed as u8 {
      return false;
    }
    if let Some(primary) = lock(&self.primary).take() {
      primary.unsubscribe();
    }
    true
  }

  #[cfg(test)]
  pub(crate) fn has_primary(&self) -> bool { lock(&self.primary).as_ref().is_some_and(|s| !s.is_closed()) }
}
