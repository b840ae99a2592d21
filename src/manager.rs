//! Event manager
//!
//! [`EventManager`] is the bridge between a source that pushes events through
//! a single callback and the code that wants to consume them as streams.
//!
//! ```text
//! source ── handle(e) ──> pipeline ──> BroadcastChannel ──┬─> on::<K>() views
//!                                                          ├─> registered listeners
//!                                                          └─> primary subscription
//! ```
//!
//! `handle` never blocks and never panics to its caller: a failure while
//! pushing an event is turned into an [`ExceptionEvent`] on the same stream.
//! The [`Shutdown`] event completes the stream and disposes the manager,
//! each step toggled by [`ManagerConfig`].

use std::{
  fmt,
  panic::{catch_unwind, AssertUnwindSafe},
  sync::Arc,
};

use futures::Stream;

use crate::{
  channel::BroadcastChannel,
  config::ManagerConfig,
  error::{DeliveryError, RegistryError},
  event::{DynEvent, EventKind, ExceptionEvent, Shutdown},
  lifecycle::{Lifecycle, LifecycleState},
  observer::FnMutObserver,
  pipeline::Pipeline,
  registry::{resolve, EventListener, ListenerId, ListenerObject, ListenerRegistry, Resolved},
  scheduler::{SharedScheduler, ThreadPoolScheduler},
  view::EventView,
};

mod forward;
pub use forward::Forward;

/// The boundary the event source talks to.
///
/// Listeners arrive as opaque objects; the callback capability is resolved at
/// runtime. An object holding an `Arc<dyn EventListener>` or a
/// [`ListenerFn`](crate::registry::ListenerFn) is accepted, anything else is
/// rejected with [`RegistryError::UnsupportedCapability`].
pub trait EventHandler: Send + Sync {
  /// Push one event. Must not block and must not panic.
  fn handle(&self, event: DynEvent);

  fn register_object(&self, object: ListenerObject) -> Result<(), RegistryError>;

  fn unregister_object(&self, object: &ListenerObject) -> Result<(), RegistryError>;

  fn registered_objects(&self) -> Vec<ListenerObject>;
}

/// Reactive event manager. Clones share the same channel and lifecycle.
#[derive(Clone)]
pub struct EventManager {
  inner: Arc<ManagerInner>,
}

struct ManagerInner {
  channel: BroadcastChannel,
  registry: ListenerRegistry,
  lifecycle: Lifecycle,
  scheduler: SharedScheduler,
  owns_scheduler: bool,
  pipeline: Pipeline,
  complete_on_shutdown: bool,
  dispose_on_shutdown: bool,
}

impl Default for EventManager {
  fn default() -> Self { Self::new() }
}

impl EventManager {
  /// A manager with [`ManagerConfig::default`]: unbounded buffers, a
  /// dedicated worker thread, and full teardown on shutdown.
  pub fn new() -> Self { Self::with_config(ManagerConfig::default()) }

  pub fn with_config(config: ManagerConfig) -> Self {
    let ManagerConfig {
      overflow,
      complete_on_shutdown,
      dispose_on_shutdown,
      auto_subscribe,
      scheduler,
      worker_name,
      pipeline,
    } = config;

    let (scheduler, owns_scheduler) = match scheduler {
      Some(scheduler) => (scheduler, false),
      None => (Arc::new(ThreadPoolScheduler::single(worker_name)) as SharedScheduler, true),
    };
    let channel = BroadcastChannel::new(overflow, scheduler.clone());
    let primary = auto_subscribe.then(|| {
      channel.subscribe(FnMutObserver(|event: DynEvent| {
        tracing::trace!(source = %event.source(), ?event, "event dispatched");
      }))
    });
    tracing::debug!(
      ?overflow,
      owns_scheduler,
      auto_subscribe,
      identity_pipeline = pipeline.is_identity(),
      "event manager created"
    );

    EventManager {
      inner: Arc::new(ManagerInner {
        channel,
        registry: ListenerRegistry::default(),
        lifecycle: Lifecycle::new(primary),
        scheduler,
        owns_scheduler,
        pipeline,
        complete_on_shutdown,
        dispose_on_shutdown,
      }),
    }
  }

  /// Push one event from the source.
  ///
  /// Runs the pipeline and publishes on the calling thread, then returns
  /// without waiting for any subscriber. After the stream has been completed
  /// this is a no-op.
  pub fn handle(&self, event: DynEvent) {
    let terminal = event.is::<Shutdown>();
    let outcome = catch_unwind(AssertUnwindSafe(|| self.dispatch(event.clone())));
    let failure = match outcome {
      Ok(Ok(())) => None,
      Ok(Err(err)) => Some(err),
      Err(payload) => Some(DeliveryError::from_panic(payload)),
    };
    if let Some(error) = failure {
      self.report(event, error);
    }
    if terminal {
      self.on_shutdown();
    }
  }

  /// Alias of [`handle`](EventManager::handle).
  #[inline]
  pub fn deliver(&self, event: DynEvent) { self.handle(event) }

  fn dispatch(&self, event: DynEvent) -> Result<(), DeliveryError> {
    if let Some(event) = self.inner.pipeline.apply(event)? {
      self.inner.channel.publish(event);
    }
    Ok(())
  }

  /// Publish an [`ExceptionEvent`] for `event`, bypassing the pipeline.
  fn report(&self, event: DynEvent, error: DeliveryError) {
    let source = event.source();
    tracing::debug!(%source, %error, "event delivery failed, publishing exception event");
    let wrapper: DynEvent = Arc::new(ExceptionEvent { source, error: Arc::new(error), event });
    let channel = &self.inner.channel;
    if let Err(payload) = catch_unwind(AssertUnwindSafe(|| channel.publish(wrapper))) {
      tracing::error!(
        %source,
        panic = %crate::error::panic_message(payload.as_ref()),
        "failed to publish exception event, dropping it"
      );
    }
  }

  fn on_shutdown(&self) {
    tracing::debug!(
      complete = self.inner.complete_on_shutdown,
      dispose = self.inner.dispose_on_shutdown,
      "shutdown event received"
    );
    if self.inner.complete_on_shutdown {
      self.complete();
    }
    if self.inner.dispose_on_shutdown {
      self.dispose();
    }
  }

  /// Events whose type is `K`, or which declare the category `K`.
  ///
  /// The view is lazy: nothing is attached to the channel until it is
  /// subscribed to, and each subscription only sees events published after
  /// it was made.
  pub fn on<K: EventKind>(&self) -> EventView<K::Output> { EventView::of_kind::<K>(self.inner.channel.clone()) }

  /// Every event, untyped.
  pub fn events(&self) -> EventView<DynEvent> { EventView::all(self.inner.channel.clone()) }

  /// Attach a listener to the full stream. Registering the same `Arc` again
  /// replaces the previous registration.
  ///
  /// A listener stays listed while its subscription lives. Once the stream
  /// has completed, or the listener's subscription failed, it is no longer
  /// listed; registering on a completed stream succeeds but records nothing.
  pub fn register(&self, listener: Arc<dyn EventListener>) -> Result<(), RegistryError> {
    let object: ListenerObject = Arc::new(listener.clone());
    self.attach(Resolved { id: ListenerId::of(&listener), listener }, object)
  }

  /// Detach a listener. Returns `false` if it was not registered.
  pub fn unregister(&self, listener: &Arc<dyn EventListener>) -> bool {
    self.inner.registry.remove(ListenerId::of(listener))
  }

  /// A copy of the registered listeners, in registration order.
  pub fn registered_listeners(&self) -> Vec<Arc<dyn EventListener>> { self.inner.registry.listeners() }

  fn attach(&self, resolved: Resolved, object: ListenerObject) -> Result<(), RegistryError> {
    let channel = &self.inner.channel;
    self.inner.registry.insert(resolved, object, |observer| channel.subscribe(observer))
  }

  /// Complete the stream now: every subscriber gets its stream-end signal.
  pub fn complete(&self) {
    if self.inner.lifecycle.begin_completing() {
      tracing::debug!("event manager completing");
    }
    self.inner.channel.complete();
  }

  /// Tear the manager down: cancel the primary subscription and every
  /// registered listener, and stop the worker if the manager started it.
  ///
  /// Does not complete the stream. Subscriptions made through views stay
  /// attached, but once an owned worker is stopped they close on their next
  /// event. Calling it again does nothing.
  pub fn dispose(&self) {
    if !self.inner.lifecycle.dispose() {
      return;
    }
    self.inner.registry.close();
    if self.inner.owns_scheduler {
      self.inner.scheduler.dispose();
    }
    tracing::debug!(owns_scheduler = self.inner.owns_scheduler, "event manager disposed");
  }

  pub fn state(&self) -> LifecycleState { self.inner.lifecycle.state() }

  /// Whether the stream has been completed.
  pub fn is_closed(&self) -> bool { self.inner.channel.is_closed() }

  /// The worker context subscriber callbacks run on.
  pub fn scheduler(&self) -> &SharedScheduler { &self.inner.scheduler }

  /// Drive the manager from an async source. See [`Forward`].
  pub fn forward<S>(&self, source: S) -> Forward<S>
  where
    S: Stream<Item = DynEvent>,
  {
    Forward::new(self.clone(), source)
  }
}

impl EventHandler for EventManager {
  #[inline]
  fn handle(&self, event: DynEvent) { EventManager::handle(self, event) }

  fn register_object(&self, object: ListenerObject) -> Result<(), RegistryError> {
    let resolved = resolve(&object)?;
    self.attach(resolved, object)
  }

  fn unregister_object(&self, object: &ListenerObject) -> Result<(), RegistryError> {
    let Resolved { id, .. } = resolve(object)?;
    self.inner.registry.remove(id);
    Ok(())
  }

  fn registered_objects(&self) -> Vec<ListenerObject> { self.inner.registry.objects() }
}

impl fmt::Debug for EventManager {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("EventManager")
      .field("state", &self.state())
      .field("channel", &self.inner.channel)
      .field("listeners", &self.inner.registry.len())
      .field("owns_scheduler", &self.inner.owns_scheduler)
      .finish()
  }
}
