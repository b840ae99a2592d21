//! Event model
//!
//! Events are opaque values pushed by the external source. They travel
//! through the manager as [`DynEvent`] (`Arc<dyn Event>`) so that a single
//! allocation can be fanned out to any number of subscribers.
//!
//! Filtering by type goes through [`EventKind`]. Two flavours exist:
//!
//! - concrete event types, which match by exact runtime type and yield an
//!   `Arc<T>` (generated by [`impl_event!`](crate::impl_event));
//! - categories, zero-sized markers that an event type declares as one of its
//!   supertypes, which yield the untouched [`DynEvent`] (generated by
//!   [`event_category!`](crate::event_category)).
//!
//! ```rust
//! use rxbridge::{event_category, impl_event, prelude::*};
//!
//! event_category!(
//!   /// Everything that happened inside a guild.
//!   pub GuildEvents
//! );
//!
//! #[derive(Debug)]
//! pub struct MemberJoined {
//!   pub shard: SourceId,
//!   pub member: u64,
//! }
//! impl_event!(MemberJoined, source = shard, kinds = [GuildEvents]);
//!
//! let event: DynEvent = std::sync::Arc::new(MemberJoined { shard: SourceId::new(0), member: 7 });
//! assert_eq!(MemberJoined::select(&event).map(|e| e.member), Some(7));
//! assert!(GuildEvents::select(&event).is_some());
//! ```

use std::{
  any::{Any, TypeId},
  fmt::{self, Debug, Display, Formatter},
  sync::Arc,
};

use crate::error::DeliveryError;

/// Identity of the source instance an event originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SourceId(u64);

impl SourceId {
  pub const fn new(id: u64) -> Self { SourceId(id) }

  pub const fn get(self) -> u64 { self.0 }
}

impl Display for SourceId {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result { write!(f, "source#{}", self.0) }
}

/// Upcast helper so `dyn Event` can be downcast to its concrete type.
pub trait AsAny: Any + Send + Sync {
  fn as_any(&self) -> &dyn Any;
  fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
  #[inline]
  fn as_any(&self) -> &dyn Any { self }
  #[inline]
  fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> { self }
}

/// A unit of information pushed by the external source.
pub trait Event: AsAny + Debug {
  /// The source instance this event is attributed to.
  fn source(&self) -> SourceId;

  /// Whether this event declares the category `kind` as a supertype.
  fn is_kind(&self, kind: TypeId) -> bool {
    let _ = kind;
    false
  }
}

/// Shared, type-erased event as carried through the channel.
pub type DynEvent = Arc<dyn Event>;

impl dyn Event {
  #[inline]
  pub fn is<T: Event>(&self) -> bool {
    let any: &dyn Any = self.as_any();
    any.is::<T>()
  }

  #[inline]
  pub fn downcast_ref<T: Event>(&self) -> Option<&T> {
    let any: &dyn Any = self.as_any();
    any.downcast_ref::<T>()
  }
}

/// Recover the concrete `Arc<T>` behind a [`DynEvent`] without copying.
pub fn downcast_arc<T: Event>(event: &DynEvent) -> Option<Arc<T>> {
  if !event.is::<T>() {
    return None;
  }
  <dyn Event as AsAny>::into_any(event.clone()).downcast::<T>().ok()
}

/// A key that selects a subset of events and projects them to `Output`.
pub trait EventKind: 'static {
  type Output: Send + 'static;

  fn select(event: &DynEvent) -> Option<Self::Output>;
}

/// Matches every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyEvent;

impl EventKind for AnyEvent {
  type Output = DynEvent;

  #[inline]
  fn select(event: &DynEvent) -> Option<DynEvent> { Some(event.clone()) }
}

/// Implements [`Event`] and [`EventKind`] for a concrete event struct.
///
/// `source = field` names the [`SourceId`] field; the optional
/// `kinds = [..]` list declares the categories the type belongs to.
#[macro_export]
macro_rules! impl_event {
  ($ty:ty, source = $field:ident $(, kinds = [$($kind:ty),* $(,)?])? $(,)?) => {
    impl $crate::event::Event for $ty {
      fn source(&self) -> $crate::event::SourceId { self.$field }

      fn is_kind(&self, _kind: ::std::any::TypeId) -> bool {
        false $($(|| _kind == ::std::any::TypeId::of::<$kind>())*)?
      }
    }

    impl $crate::event::EventKind for $ty {
      type Output = ::std::sync::Arc<$ty>;

      fn select(event: &$crate::event::DynEvent) -> ::std::option::Option<Self::Output> {
        $crate::event::downcast_arc::<$ty>(event)
      }
    }
  };
}

/// Declares a category marker usable as an [`EventKind`].
#[macro_export]
macro_rules! event_category {
  ($(#[$meta:meta])* $vis:vis $name:ident) => {
    $(#[$meta])*
    #[derive(Debug, Clone, Copy, Default)]
    $vis struct $name;

    impl $crate::event::EventKind for $name {
      type Output = $crate::event::DynEvent;

      fn select(event: &$crate::event::DynEvent) -> ::std::option::Option<Self::Output> {
        if $crate::event::Event::is_kind(&**event, ::std::any::TypeId::of::<$name>()) {
          ::std::option::Option::Some(event.clone())
        } else {
          ::std::option::Option::None
        }
      }
    }
  };
}

event_category!(
  /// Events synthesized or recognised by the manager itself.
  pub ManagerEvents
);

/// The terminal event: the source is shutting down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shutdown {
  pub source: SourceId,
  pub code: i32,
}

impl Shutdown {
  pub fn new(source: SourceId) -> Self { Shutdown { source, code: 1000 } }
}

crate::impl_event!(Shutdown, source = source, kinds = [ManagerEvents]);

/// In-band report of a failure while delivering `event`.
#[derive(Debug, Clone)]
pub struct ExceptionEvent {
  pub source: SourceId,
  pub error: Arc<DeliveryError>,
  /// The event whose delivery failed, as it was handed to the manager.
  pub event: DynEvent,
}

crate::impl_event!(ExceptionEvent, source = source, kinds = [ManagerEvents]);
