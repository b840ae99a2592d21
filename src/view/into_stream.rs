use std::{
  collections::VecDeque,
  pin::Pin,
  task::{Context, Poll, Waker},
};

use futures::Stream;

use super::EventView;
use crate::{
  channel::EventSubscription,
  error::StreamError,
  observer::Observer,
  rc::{MutArc, RcDerefMut},
  subscription::SubscriptionGuard,
};

/// Buffer shared by the subscriber callback and the polling task.
struct StreamState<T> {
  queue: VecDeque<Result<T, StreamError>>,
  waker: Option<Waker>,
  is_closed: bool,
}

impl<T> Default for StreamState<T> {
  fn default() -> Self { StreamState { queue: VecDeque::new(), waker: None, is_closed: false } }
}

impl<T> StreamState<T> {
  fn wake(&mut self) {
    if let Some(waker) = self.waker.take() {
      waker.wake();
    }
  }
}

/// Async [`Stream`] over an [`EventView`].
///
/// - `Ok(T)` for every value the view yields;
/// - `Err(StreamError)` if the subscription is terminated by its overflow
///   policy, after which the stream ends;
/// - `None` once the manager completes.
///
/// Values are buffered between the scheduler and the polling task, so a
/// stream that is polled slowly behaves like an unbounded subscriber.
pub struct EventStream<T> {
  state: MutArc<StreamState<T>>,
  subscription: SubscriptionGuard<EventSubscription>,
}

impl<T: Send + 'static> EventStream<T> {
  pub(crate) fn new(view: &EventView<T>) -> Self {
    let state = MutArc::own(StreamState::default());
    let subscription = view.subscribe_with(StreamObserver { state: state.clone() });
    EventStream { state, subscription: SubscriptionGuard::new(subscription) }
  }

  pub fn subscription(&self) -> &EventSubscription { self.subscription.get() }
}

impl<T> Stream for EventStream<T> {
  type Item = Result<T, StreamError>;

  fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
    let mut state = self.state.rc_deref_mut();
    if let Some(item) = state.queue.pop_front() {
      return Poll::Ready(Some(item));
    }
    if state.is_closed {
      return Poll::Ready(None);
    }
    state.waker = Some(cx.waker().clone());
    Poll::Pending
  }
}

struct StreamObserver<T> {
  state: MutArc<StreamState<T>>,
}

impl<T> Observer<T, StreamError> for StreamObserver<T> {
  fn next(&mut self, value: T) {
    let mut state = self.state.rc_deref_mut();
    state.queue.push_back(Ok(value));
    state.wake();
  }

  fn error(self, err: StreamError) {
    let mut state = self.state.rc_deref_mut();
    state.queue.push_back(Err(err));
    state.is_closed = true;
    state.wake();
  }

  fn complete(self) {
    let mut state = self.state.rc_deref_mut();
    state.is_closed = true;
    state.wake();
  }

  fn is_closed(&self) -> bool { self.state.rc_deref_mut().is_closed }
}
