//! Prelude module for convenient imports
//!
//! This module re-exports commonly used types and traits for easy access.

// Channel
pub use crate::channel::{BroadcastChannel, ChannelStatus, EventSubscription, OverflowPolicy};
// Configuration
pub use crate::config::ManagerConfig;
// Errors
pub use crate::error::{BoxError, DeliveryError, RegistryError, SchedulerError, StreamError};
// Events
pub use crate::event::{
  downcast_arc, AnyEvent, DynEvent, Event, EventKind, ExceptionEvent, ManagerEvents, Shutdown,
  SourceId,
};
// Lifecycle
pub use crate::lifecycle::LifecycleState;
// Manager
pub use crate::manager::{EventHandler, EventManager, Forward};
// Observer
pub use crate::observer::{BoxedObserver, FnMutObserver, Observer, ObserverAll};
pub use crate::pipeline::Pipeline;
// Listeners
pub use crate::registry::{EventListener, ListenerFn, ListenerId, ListenerObject};
// Schedulers
#[cfg(feature = "tokio-scheduler")]
pub use crate::scheduler::TokioScheduler;
pub use crate::scheduler::{InlineScheduler, Scheduler, SharedScheduler, Task, ThreadPoolScheduler};
// Subscription
pub use crate::subscription::{Subscription, SubscriptionGuard};
// Views
pub use crate::view::{EventStream, EventView};
