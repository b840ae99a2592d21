//! Broadcast channel
//!
//! The multicast primitive every view reads from. Publishing fans an event
//! out to one inbox per subscriber; each inbox applies the
//! [`OverflowPolicy`] on its own and drains on the scheduler, so a slow
//! subscriber neither blocks the producer nor holds back its siblings'
//! buffers.
//!
//! ```text
//!                 ┌─> inbox#0 ──(scheduler)──> observer
//! publish(e) ─────┼─> inbox#1 ──(scheduler)──> observer
//!                 └─> inbox#2 ──(scheduler)──> observer
//! ```
//!
//! The channel moves `Open → Completing → Closed` exactly once. Publishing to
//! a channel that is not open is a no-op, subscribing to it yields an
//! already-completed subscription.

use std::sync::{Arc, Mutex};

use crate::{
  error::StreamError,
  event::DynEvent,
  observer::Observer,
  rc::lock,
  scheduler::SharedScheduler,
};

mod inbox;
mod overflow;
mod subscribers;
mod subscription;

pub(crate) use inbox::ChannelObserver;
use inbox::Inbox;
pub use overflow::OverflowPolicy;
use subscribers::Subscribers;
pub use subscription::EventSubscription;

/// Lifecycle of a [`BroadcastChannel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
  Open,
  /// `complete()` is handing stream-end signals to the subscribers.
  Completing,
  Closed,
}

/// Shared handle to the broadcast buffer. Clones address the same channel.
#[derive(Clone)]
pub struct BroadcastChannel {
  inner: Arc<ChannelInner>,
}

pub(crate) struct ChannelInner {
  state: Mutex<ChannelState>,
  policy: OverflowPolicy,
  scheduler: SharedScheduler,
}

struct ChannelState {
  status: ChannelStatus,
  subscribers: Subscribers,
}

impl ChannelInner {
  pub(crate) fn remove(&self, id: usize) {
    if lock(&self.state).subscribers.remove(id).is_some() {
      tracing::trace!(subscription = id, "subscriber detached");
    }
  }
}

impl BroadcastChannel {
  pub fn new(policy: OverflowPolicy, scheduler: SharedScheduler) -> Self {
    BroadcastChannel {
      inner: Arc::new(ChannelInner {
        state: Mutex::new(ChannelState { status: ChannelStatus::Open, subscribers: Subscribers::default() }),
        policy,
        scheduler,
      }),
    }
  }

  /// Fan `event` out to the current subscribers. Never blocks on them.
  pub fn publish(&self, event: DynEvent) {
    let targets = {
      let state = lock(&self.inner.state);
      if state.status != ChannelStatus::Open {
        tracing::trace!(source = %event.source(), "channel closed, event ignored");
        return;
      }
      state.subscribers.snapshot()
    };
    for inbox in &targets {
      inbox.push_next(event.clone());
    }
  }

  /// Close the channel; every current subscriber gets its stream-end signal
  /// once. Later calls do nothing.
  pub fn complete(&self) {
    let targets = {
      let mut state = lock(&self.inner.state);
      if state.status != ChannelStatus::Open {
        return;
      }
      state.status = ChannelStatus::Completing;
      state.subscribers.take_all()
    };
    tracing::debug!(subscribers = targets.len(), "completing channel");
    for inbox in &targets {
      inbox.push_complete();
    }
    lock(&self.inner.state).status = ChannelStatus::Closed;
  }

  /// Attach `observer`, starting with the next published event.
  ///
  /// On a channel that is no longer open the observer is completed right away
  /// on the calling thread and a closed subscription is returned.
  pub fn subscribe<O>(&self, observer: O) -> EventSubscription
  where
    O: Observer<DynEvent, StreamError> + Send + 'static,
  {
    let observer: ChannelObserver = Box::new(observer);
    let mut state = lock(&self.inner.state);
    if state.status != ChannelStatus::Open {
      drop(state);
      observer.complete();
      return EventSubscription::closed();
    }
    let id = state.subscribers.reserve_id();
    let inbox = Arc::new(Inbox::new(
      id,
      observer,
      self.inner.policy,
      self.inner.scheduler.clone(),
      Arc::downgrade(&self.inner),
    ));
    state.subscribers.insert(inbox.clone());
    tracing::trace!(subscription = id, "subscriber attached");
    EventSubscription::new(inbox)
  }

  pub fn status(&self) -> ChannelStatus { lock(&self.inner.state).status }

  #[inline]
  pub fn is_closed(&self) -> bool { self.status() != ChannelStatus::Open }

  pub fn subscriber_count(&self) -> usize { lock(&self.inner.state).subscribers.len() }

  pub fn policy(&self) -> OverflowPolicy { self.inner.policy }

  pub fn scheduler(&self) -> &SharedScheduler { &self.inner.scheduler }
}

impl std::fmt::Debug for BroadcastChannel {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let state = lock(&self.inner.state);
    f.debug_struct("BroadcastChannel")
      .field("status", &state.status)
      .field("subscribers", &state.subscribers.len())
      .field("policy", &self.inner.policy)
      .finish()
  }
}
