//! Event views
//!
//! An [`EventView`] is a lazy, typed window onto the manager's broadcast
//! channel. Building or transforming a view does nothing; only subscribing
//! attaches an observer. Selection and the transforms run on the scheduler,
//! next to the subscriber's callback, never on the producer thread.
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//!
//! use rxbridge::prelude::*;
//!
//! let manager = EventManager::with_config(ManagerConfig {
//!   scheduler: Some(Arc::new(InlineScheduler::new())),
//!   ..ManagerConfig::default()
//! });
//!
//! let codes = Arc::new(Mutex::new(vec![]));
//! let c_codes = codes.clone();
//! let _subscription = manager
//!   .on::<Shutdown>()
//!   .map(|shutdown| shutdown.code)
//!   .subscribe(move |code| c_codes.lock().unwrap().push(code));
//!
//! manager.handle(Arc::new(Shutdown::new(SourceId::new(0))));
//! assert_eq!(*codes.lock().unwrap(), [1000]);
//! ```

use std::{fmt, sync::Arc};

use crate::{
  channel::{BroadcastChannel, EventSubscription},
  error::StreamError,
  event::{DynEvent, EventKind, SourceId},
  observer::{FnMutObserver, Observer, ObserverAll},
};

mod into_stream;
pub use into_stream::EventStream;

type Selector<T> = Arc<dyn Fn(&DynEvent) -> Option<T> + Send + Sync>;

/// A lazily evaluated, filtered and projected view of the event stream.
pub struct EventView<T> {
  channel: BroadcastChannel,
  selector: Selector<T>,
}

impl<T> Clone for EventView<T> {
  fn clone(&self) -> Self { EventView { channel: self.channel.clone(), selector: self.selector.clone() } }
}

impl EventView<DynEvent> {
  /// Every event, unfiltered.
  pub(crate) fn all(channel: BroadcastChannel) -> Self {
    EventView { channel, selector: Arc::new(|event: &DynEvent| Some(event.clone())) }
  }
}

impl<T: Send + 'static> EventView<T> {
  /// Events matching `K`, projected to `K::Output`.
  pub(crate) fn of_kind<K>(channel: BroadcastChannel) -> Self
  where
    K: EventKind<Output = T>,
  {
    EventView { channel, selector: Arc::new(K::select) }
  }

  /// Keep only the values for which `predicate` returns `true`.
  pub fn filter<F>(self, predicate: F) -> EventView<T>
  where
    F: Fn(&T) -> bool + Send + Sync + 'static,
  {
    let selector = self.selector;
    EventView {
      channel: self.channel,
      selector: Arc::new(move |event: &DynEvent| selector(event).filter(|value| predicate(value))),
    }
  }

  pub fn map<U, F>(self, f: F) -> EventView<U>
  where
    U: Send + 'static,
    F: Fn(T) -> U + Send + Sync + 'static,
  {
    let selector = self.selector;
    EventView { channel: self.channel, selector: Arc::new(move |event: &DynEvent| selector(event).map(&f)) }
  }

  pub fn filter_map<U, F>(self, f: F) -> EventView<U>
  where
    U: Send + 'static,
    F: Fn(T) -> Option<U> + Send + Sync + 'static,
  {
    let selector = self.selector;
    EventView {
      channel: self.channel,
      selector: Arc::new(move |event: &DynEvent| selector(event).and_then(&f)),
    }
  }

  /// Run `f` on every value that reaches this point of the view.
  pub fn tap<F>(self, f: F) -> EventView<T>
  where
    F: Fn(&T) + Send + Sync + 'static,
  {
    self.filter(move |value| {
      f(value);
      true
    })
  }

  /// Keep only events attributed to `source`.
  pub fn from_source(self, source: SourceId) -> EventView<T> {
    let selector = self.selector;
    EventView {
      channel: self.channel,
      selector: Arc::new(move |event: &DynEvent| {
        if event.source() == source {
          selector(event)
        } else {
          None
        }
      }),
    }
  }

  /// Attach a callback, starting with the next event published.
  ///
  /// Stream failures of this subscription are logged and otherwise ignored;
  /// use [`subscribe_all`](EventView::subscribe_all) to observe them.
  pub fn subscribe<F>(&self, next: F) -> EventSubscription
  where
    F: FnMut(T) + Send + 'static,
  {
    self.subscribe_with(FnMutObserver(next))
  }

  pub fn subscribe_all<N, E, C>(&self, next: N, error: E, complete: C) -> EventSubscription
  where
    N: FnMut(T) + Send + 'static,
    E: FnOnce(StreamError) + Send + 'static,
    C: FnOnce() + Send + 'static,
  {
    self.subscribe_with(ObserverAll::new(next, error, complete))
  }

  pub fn subscribe_with<O>(&self, observer: O) -> EventSubscription
  where
    O: Observer<T, StreamError> + Send + 'static,
  {
    self.channel.subscribe(SelectObserver { selector: self.selector.clone(), observer })
  }

  /// Consume the view as an async [`Stream`](futures::Stream).
  ///
  /// The subscription is made right away; dropping the stream cancels it.
  pub fn into_stream(self) -> EventStream<T> { EventStream::new(&self) }
}

impl<T> fmt::Debug for EventView<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("EventView")
      .field("item", &std::any::type_name::<T>())
      .field("channel", &self.channel)
      .finish()
  }
}

/// Applies a view's selector in front of the user's observer.
struct SelectObserver<T, O> {
  selector: Selector<T>,
  observer: O,
}

impl<T, O> Observer<DynEvent, StreamError> for SelectObserver<T, O>
where
  O: Observer<T, StreamError>,
{
  fn next(&mut self, event: DynEvent) {
    if let Some(value) = (self.selector)(&event) {
      self.observer.next(value);
    }
  }

  #[inline]
  fn error(self, err: StreamError) { self.observer.error(err) }

  #[inline]
  fn complete(self) { self.observer.complete() }

  #[inline]
  fn is_closed(&self) -> bool { self.observer.is_closed() }
}

#[cfg(test)]
mod test {
  use std::sync::Mutex;

  use super::*;
  use crate::{
    channel::OverflowPolicy,
    event::{AnyEvent, ManagerEvents, Shutdown},
    scheduler::InlineScheduler,
    subscription::Subscription,
  };

  #[derive(Debug)]
  struct Ping {
    shard: SourceId,
    n: i32,
  }
  crate::impl_event!(Ping, source = shard);

  #[derive(Debug)]
  struct Pong {
    shard: SourceId,
  }
  crate::impl_event!(Pong, source = shard);

  fn channel() -> BroadcastChannel {
    BroadcastChannel::new(OverflowPolicy::Buffer, Arc::new(InlineScheduler::new()))
  }

  fn ping(shard: u64, n: i32) -> DynEvent { Arc::new(Ping { shard: SourceId::new(shard), n }) }

  fn pong(shard: u64) -> DynEvent { Arc::new(Pong { shard: SourceId::new(shard) }) }

  fn collect<T: Send + 'static>(view: &EventView<T>) -> (Arc<Mutex<Vec<T>>>, EventSubscription) {
    let seen = Arc::new(Mutex::new(vec![]));
    let c_seen = seen.clone();
    let subscription = view.subscribe(move |v| c_seen.lock().unwrap().push(v));
    (seen, subscription)
  }

  #[test]
  fn selects_by_type() {
    let channel = channel();
    let (pings, _a) = collect(&EventView::of_kind::<Ping>(channel.clone()).map(|p| p.n));
    let (all, _b) = collect(&EventView::<DynEvent>::of_kind::<AnyEvent>(channel.clone()));
    let (manager, _c) = collect(&EventView::<DynEvent>::of_kind::<ManagerEvents>(channel.clone()));

    channel.publish(ping(0, 1));
    channel.publish(pong(0));
    channel.publish(ping(0, 2));
    channel.publish(Arc::new(Shutdown::new(SourceId::new(0))));

    assert_eq!(*pings.lock().unwrap(), [1, 2]);
    assert_eq!(all.lock().unwrap().len(), 4);
    assert_eq!(manager.lock().unwrap().len(), 1);
  }

  #[test]
  fn transforms_compose() {
    let channel = channel();
    let tapped = Arc::new(Mutex::new(0));
    let c_tapped = tapped.clone();
    let view = EventView::of_kind::<Ping>(channel.clone())
      .tap(move |_| *c_tapped.lock().unwrap() += 1)
      .filter(|p| p.n % 2 == 0)
      .filter_map(|p| (p.n < 6).then_some(p.n * 10));
    let (seen, _subscription) = collect(&view);

    for n in 1..=7 {
      channel.publish(ping(0, n));
    }
    assert_eq!(*seen.lock().unwrap(), [20, 40]);
    assert_eq!(*tapped.lock().unwrap(), 7);
  }

  #[test]
  fn filters_by_source() {
    let channel = channel();
    let view = EventView::all(channel.clone()).from_source(SourceId::new(2));
    let (seen, _subscription) = collect(&view);

    channel.publish(ping(1, 1));
    channel.publish(pong(2));
    channel.publish(ping(2, 3));
    let sources: Vec<_> = seen.lock().unwrap().iter().map(|e| e.source().get()).collect();
    assert_eq!(sources, [2, 2]);
  }

  #[test]
  fn views_are_lazy_and_reusable() {
    let channel = channel();
    let view = EventView::of_kind::<Ping>(channel.clone()).map(|p| p.n);
    assert_eq!(channel.subscriber_count(), 0);

    let (first, a) = collect(&view);
    channel.publish(ping(0, 1));
    let (second, _b) = collect(&view.clone());
    channel.publish(ping(0, 2));
    a.unsubscribe();
    channel.publish(ping(0, 3));

    assert_eq!(*first.lock().unwrap(), [1, 2]);
    assert_eq!(*second.lock().unwrap(), [2, 3]);
  }

  #[test]
  fn subscribe_all_sees_completion() {
    let channel = channel();
    let log = Arc::new(Mutex::new(vec![]));
    let (next, end) = (log.clone(), log.clone());
    let subscription = EventView::of_kind::<Pong>(channel.clone()).subscribe_all(
      move |p| next.lock().unwrap().push(format!("pong from {}", p.shard)),
      |err| panic!("unexpected {err}"),
      move || end.lock().unwrap().push("end".to_owned()),
    );

    channel.publish(pong(4));
    channel.publish(ping(4, 0));
    channel.complete();
    assert_eq!(*log.lock().unwrap(), ["pong from source#4", "end"]);
    assert!(subscription.is_closed());
  }
}
