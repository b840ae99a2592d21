use std::{
  collections::VecDeque,
  panic::{catch_unwind, AssertUnwindSafe},
  sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, Mutex, TryLockError, Weak,
  },
};

use super::{
  overflow::{Admission, OverflowPolicy},
  ChannelInner,
};
use crate::{
  error::{panic_message, StreamError},
  event::DynEvent,
  observer::{BoxedObserver, Observer},
  rc::lock,
  scheduler::SharedScheduler,
};

pub(crate) type ChannelObserver = BoxedObserver<'static, DynEvent, StreamError>;

enum Notification {
  Next(DynEvent),
  Error(StreamError),
  Complete,
}

#[derive(Default)]
struct Queue {
  items: VecDeque<Notification>,
  /// The drain task has taken an event and its callback has not returned.
  in_hand: bool,
  /// A drain task is queued or running.
  draining: bool,
  /// A stream-end signal was queued; later events are refused.
  terminated: bool,
}

impl Queue {
  fn pending(&self) -> usize { self.items.len() + usize::from(self.in_hand) }

  /// Arm the drain flag, returning whether a new drain task is needed.
  fn arm(&mut self) -> bool { !std::mem::replace(&mut self.draining, true) }
}

/// One subscriber's slice of the broadcast fan-out.
///
/// The producer pushes notifications in; a drain task on the scheduler pops
/// them and runs the observer. The drain never holds the queue lock while the
/// observer runs, so the observer may publish, subscribe or unsubscribe
/// without deadlocking.
pub(crate) struct Inbox {
  id: usize,
  queue: Mutex<Queue>,
  observer: Mutex<Option<ChannelObserver>>,
  closed: AtomicBool,
  dropped: AtomicU64,
  policy: OverflowPolicy,
  scheduler: SharedScheduler,
  channel: Weak<ChannelInner>,
}

impl Inbox {
  pub(crate) fn new(
    id: usize,
    observer: ChannelObserver,
    policy: OverflowPolicy,
    scheduler: SharedScheduler,
    channel: Weak<ChannelInner>,
  ) -> Self {
    Inbox {
      id,
      queue: Mutex::new(Queue::default()),
      observer: Mutex::new(Some(observer)),
      closed: AtomicBool::new(false),
      dropped: AtomicU64::new(0),
      policy,
      scheduler,
      channel,
    }
  }

  #[inline]
  pub(crate) fn id(&self) -> usize { self.id }

  #[inline]
  pub(crate) fn is_closed(&self) -> bool { self.closed.load(Ordering::Acquire) }

  #[inline]
  pub(crate) fn dropped(&self) -> u64 { self.dropped.load(Ordering::Relaxed) }

  pub(crate) fn push_next(self: &Arc<Self>, event: DynEvent) {
    if self.is_closed() {
      return;
    }
    let schedule = {
      let mut queue = lock(&self.queue);
      if queue.terminated {
        return;
      }
      let queued = queue.items.len();
      match self.policy.admit(queue.pending(), queued) {
        Admission::Accept => queue.items.push_back(Notification::Next(event)),
        Admission::DropIncoming => {
          self.record_drop();
          return;
        }
        Admission::EvictOldest => {
          queue.items.pop_front();
          queue.items.push_back(Notification::Next(event));
          self.record_drop();
        }
        Admission::Overflow { capacity } => {
          tracing::debug!(subscription = self.id, capacity, "subscriber overflowed");
          queue.items.clear();
          queue.items.push_back(Notification::Error(StreamError::Overflow { capacity }));
          queue.terminated = true;
        }
      }
      queue.arm()
    };
    if schedule {
      self.schedule();
    }
  }

  /// Queue the stream-end signal. Bypasses the overflow policy.
  pub(crate) fn push_complete(self: &Arc<Self>) {
    if self.is_closed() {
      return;
    }
    let schedule = {
      let mut queue = lock(&self.queue);
      if std::mem::replace(&mut queue.terminated, true) {
        return;
      }
      queue.items.push_back(Notification::Complete);
      queue.arm()
    };
    if schedule {
      self.schedule();
    }
  }

  /// Synchronous cancellation. No callback starts after this returns.
  pub(crate) fn cancel(&self) {
    if self.closed.swap(true, Ordering::AcqRel) {
      return;
    }
    {
      let mut queue = lock(&self.queue);
      queue.items.clear();
      queue.terminated = true;
    }
    // A running callback holds the observer; the drain drops it afterwards.
    let observer = match self.observer.try_lock() {
      Ok(mut slot) => slot.take(),
      Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().take(),
      Err(TryLockError::WouldBlock) => None,
    };
    drop(observer);
    self.detach();
  }

  fn record_drop(&self) {
    let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
    tracing::debug!(
      subscription = self.id,
      capacity = ?self.policy.capacity(),
      dropped,
      "subscriber buffer full, event dropped"
    );
  }

  fn schedule(self: &Arc<Self>) {
    let inbox = self.clone();
    if let Err(err) = self.scheduler.spawn(Box::new(move || inbox.drain())) {
      tracing::warn!(
        subscription = self.id,
        error = %err,
        "scheduler unavailable, terminating subscription"
      );
      self.abort();
    }
  }

  /// Terminate on the calling thread after the scheduler refused the drain.
  ///
  /// A stream-end signal that was already queued is delivered as is; anything
  /// else ends the subscription with [`StreamError::SchedulerUnavailable`].
  fn abort(&self) {
    if self.is_closed() {
      return;
    }
    let last = {
      let mut queue = lock(&self.queue);
      let last = queue.items.pop_back();
      queue.items.clear();
      queue.terminated = true;
      queue.draining = false;
      last
    };
    match last {
      Some(Notification::Complete) => self.finish(|observer| observer.complete()),
      Some(Notification::Error(err)) => self.finish(move |observer| observer.error(err)),
      _ => self.finish(|observer| observer.error(StreamError::SchedulerUnavailable)),
    }
  }

  fn drain(self: Arc<Self>) {
    loop {
      let notification = {
        let mut queue = lock(&self.queue);
        queue.in_hand = false;
        if self.is_closed() {
          queue.items.clear();
          queue.draining = false;
          drop(queue);
          lock(&self.observer).take();
          return;
        }
        match queue.items.pop_front() {
          Some(notification) => {
            queue.in_hand = true;
            notification
          }
          None => {
            queue.draining = false;
            return;
          }
        }
      };

      match notification {
        Notification::Next(event) => self.deliver(event),
        Notification::Error(err) => self.finish(move |observer| observer.error(err)),
        Notification::Complete => self.finish(|observer| observer.complete()),
      }
    }
  }

  fn deliver(&self, event: DynEvent) {
    let mut slot = lock(&self.observer);
    if self.is_closed() {
      return;
    }
    let Some(observer) = slot.as_mut() else { return };
    if let Err(payload) = catch_unwind(AssertUnwindSafe(|| observer.next(event))) {
      tracing::error!(
        subscription = self.id,
        panic = %panic_message(payload.as_ref()),
        "subscriber panicked while handling an event"
      );
    }
    if observer.is_closed() {
      drop(slot);
      self.cancel();
    }
  }

  fn finish(&self, signal: impl FnOnce(ChannelObserver)) {
    let observer = lock(&self.observer).take();
    self.closed.store(true, Ordering::Release);
    if let Some(observer) = observer {
      if let Err(payload) = catch_unwind(AssertUnwindSafe(|| signal(observer))) {
        tracing::error!(
          subscription = self.id,
          panic = %panic_message(payload.as_ref()),
          "subscriber panicked while handling stream end"
        );
      }
    }
    self.detach();
  }

  /// Leave the channel's subscriber table.
  fn detach(&self) {
    if let Some(channel) = self.channel.upgrade() {
      channel.remove(self.id);
    }
  }
}
