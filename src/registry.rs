//! Listener registry
//!
//! Maps callback-style listeners onto channel subscriptions. Every listener
//! owns exactly one subscription to the full event stream; registering the
//! same listener again replaces it and cancels the old one.

use std::{
  any::Any,
  fmt,
  panic::{catch_unwind, AssertUnwindSafe},
  sync::{Arc, Mutex, Weak},
};

use crate::{
  channel::EventSubscription,
  error::{panic_message, RegistryError, StreamError},
  event::DynEvent,
  observer::Observer,
  rc::lock,
  subscription::Subscription,
};

/// A callback-style consumer that sees every event.
pub trait EventListener: Send + Sync + 'static {
  fn on_event(&self, event: &DynEvent);
}

/// Closure adapter for [`EventListener`].
///
/// Clones share the closure and are the same listener to the registry.
#[derive(Clone)]
pub struct ListenerFn(Arc<dyn Fn(&DynEvent) + Send + Sync>);

impl ListenerFn {
  pub fn new<F>(f: F) -> Self
  where
    F: Fn(&DynEvent) + Send + Sync + 'static,
  {
    ListenerFn(Arc::new(f))
  }

  pub fn id(&self) -> ListenerId { ListenerId(Arc::as_ptr(&self.0) as *const () as usize) }
}

impl EventListener for ListenerFn {
  #[inline]
  fn on_event(&self, event: &DynEvent) { (self.0)(event) }
}

impl fmt::Debug for ListenerFn {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.debug_tuple("ListenerFn").field(&self.id()).finish() }
}

/// Pointer identity of a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(usize);

impl ListenerId {
  pub fn of(listener: &Arc<dyn EventListener>) -> Self {
    ListenerId(Arc::as_ptr(listener) as *const () as usize)
  }
}

impl fmt::Display for ListenerId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "listener@{:#x}", self.0) }
}

/// An opaque object accepted at the [`EventHandler`](crate::manager::EventHandler)
/// boundary.
pub type ListenerObject = Arc<dyn Any + Send + Sync>;

/// A listener resolved from an opaque object.
pub(crate) struct Resolved {
  pub(crate) id: ListenerId,
  pub(crate) listener: Arc<dyn EventListener>,
}

/// Find the callback capability inside `object`.
///
/// Two shapes are understood: an `Arc<dyn EventListener>` and a
/// [`ListenerFn`]. Anything else is
/// [`RegistryError::UnsupportedCapability`].
pub(crate) fn resolve(object: &ListenerObject) -> Result<Resolved, RegistryError> {
  if let Some(listener) = object.downcast_ref::<Arc<dyn EventListener>>() {
    return Ok(Resolved { id: ListenerId::of(listener), listener: listener.clone() });
  }
  if let Some(listener) = object.downcast_ref::<ListenerFn>() {
    return Ok(Resolved { id: listener.id(), listener: Arc::new(listener.clone()) });
  }
  Err(RegistryError::UnsupportedCapability { type_id: Any::type_id(&**object) })
}

struct Entry {
  id: ListenerId,
  /// Distinguishes this registration from a later one of the same listener.
  token: u64,
  listener: Arc<dyn EventListener>,
  object: ListenerObject,
  subscription: EventSubscription,
}

#[derive(Default)]
struct RegistryState {
  entries: Vec<Entry>,
  next_token: u64,
  closed: bool,
}

impl RegistryState {
  fn remove(&mut self, matches: impl Fn(&Entry) -> bool) -> Option<Entry> {
    let position = self.entries.iter().position(matches);
    position.map(|idx| self.entries.remove(idx))
  }
}

/// Registration table, in registration order.
///
/// An entry lives exactly as long as its subscription: a listener whose
/// stream ends or fails is dropped from the table.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
  state: Arc<Mutex<RegistryState>>,
}

impl ListenerRegistry {
  /// Add or replace the entry for `resolved.id`. `subscribe` attaches the
  /// listener to the channel; it runs without the registry lock held, since a
  /// closed channel ends the new subscription before `subscribe` returns.
  pub(crate) fn insert(
    &self,
    resolved: Resolved,
    object: ListenerObject,
    subscribe: impl FnOnce(ListenerObserver) -> EventSubscription,
  ) -> Result<(), RegistryError> {
    let Resolved { id, listener } = resolved;
    let token = {
      let mut state = lock(&self.state);
      if state.closed {
        return Err(RegistryError::Disposed);
      }
      state.next_token += 1;
      state.next_token
    };
    let subscription = subscribe(ListenerObserver {
      id,
      token,
      listener: listener.clone(),
      registry: Arc::downgrade(&self.state),
    });

    let mut state = lock(&self.state);
    if state.closed {
      drop(state);
      subscription.unsubscribe();
      return Err(RegistryError::Disposed);
    }
    // An ended subscription already tried to remove its entry; only record
    // live ones.
    if subscription.is_closed() {
      drop(state);
      tracing::debug!(listener = %id, "event stream already ended, listener not recorded");
      return Ok(());
    }
    let entry = Entry { id, token, listener, object, subscription };
    let replaced = match state.entries.iter().position(|e| e.id == id) {
      Some(idx) => Some(std::mem::replace(&mut state.entries[idx], entry)),
      None => {
        state.entries.push(entry);
        None
      }
    };
    drop(state);
    match replaced {
      Some(old) => {
        tracing::debug!(listener = %id, "listener re-registered, previous subscription cancelled");
        old.subscription.unsubscribe();
      }
      None => tracing::debug!(listener = %id, "listener registered"),
    }
    Ok(())
  }

  /// Remove and cancel the entry for `id`. Unknown ids are ignored.
  pub(crate) fn remove(&self, id: ListenerId) -> bool {
    let removed = lock(&self.state).remove(|e| e.id == id);
    match removed {
      Some(entry) => {
        entry.subscription.unsubscribe();
        tracing::debug!(listener = %id, "listener unregistered");
        true
      }
      None => false,
    }
  }

  pub(crate) fn listeners(&self) -> Vec<Arc<dyn EventListener>> {
    lock(&self.state).entries.iter().map(|e| e.listener.clone()).collect()
  }

  pub(crate) fn objects(&self) -> Vec<ListenerObject> {
    lock(&self.state).entries.iter().map(|e| e.object.clone()).collect()
  }

  pub(crate) fn len(&self) -> usize { lock(&self.state).entries.len() }

  /// Cancel every entry and refuse later registrations.
  pub(crate) fn close(&self) {
    let entries = {
      let mut state = lock(&self.state);
      state.closed = true;
      std::mem::take(&mut state.entries)
    };
    if !entries.is_empty() {
      tracing::debug!(listeners = entries.len(), "cancelling registered listeners");
    }
    for entry in entries {
      entry.subscription.unsubscribe();
    }
  }
}

/// Drives one [`EventListener`] from its channel subscription.
pub(crate) struct ListenerObserver {
  id: ListenerId,
  token: u64,
  listener: Arc<dyn EventListener>,
  registry: Weak<Mutex<RegistryState>>,
}

impl ListenerObserver {
  /// Drop this registration from the table once its stream is over.
  fn retire(&self) {
    let Some(registry) = self.registry.upgrade() else { return };
    let retired = lock(&registry).remove(|e| e.id == self.id && e.token == self.token);
    if retired.is_some() {
      tracing::debug!(listener = %self.id, "listener stream ended, entry removed");
    }
  }
}

impl Observer<DynEvent, StreamError> for ListenerObserver {
  fn next(&mut self, event: DynEvent) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(|| self.listener.on_event(&event))) {
      tracing::error!(
        listener = %self.id,
        source = %event.source(),
        panic = %panic_message(payload.as_ref()),
        "listener panicked"
      );
    }
  }

  fn error(self, err: StreamError) {
    tracing::warn!(listener = %self.id, error = %err, "listener subscription terminated");
    self.retire();
  }

  fn complete(self) {
    tracing::trace!(listener = %self.id, "listener stream completed");
    self.retire();
  }

  #[inline]
  fn is_closed(&self) -> bool { false }
}
