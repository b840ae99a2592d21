//! # rxbridge: reactive event manager
//!
//! Turns a push-style `handle(event)` callback into cancellable,
//! multi-consumer, type-filtered event streams.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::{mpsc, Arc};
//!
//! use rxbridge::prelude::*;
//!
//! #[derive(Debug)]
//! struct Message {
//!   shard: SourceId,
//!   text: String,
//! }
//! rxbridge::impl_event!(Message, source = shard);
//!
//! let manager = EventManager::new();
//! let (tx, rx) = mpsc::channel();
//! let _subscription = manager.on::<Message>().subscribe(move |m| tx.send(m.text.clone()).unwrap());
//!
//! // called by the event source, on its own thread
//! manager.handle(Arc::new(Message { shard: SourceId::new(0), text: "hello".into() }));
//! assert_eq!(rx.recv().unwrap(), "hello");
//!
//! manager.handle(Arc::new(Shutdown::new(SourceId::new(0))));
//! ```
//!
//! ## Key Concepts
//!
//! | Type | Description |
//! |------|-------------|
//! | [`EventManager`] | Entry point for the source; owns channel, registry and lifecycle |
//! | [`EventView`] | Lazy filtered view, subscribed with a closure or as a `Stream` |
//! | [`BroadcastChannel`] | Per-subscriber inboxes with an [`OverflowPolicy`] |
//! | [`Scheduler`] | Worker context subscriber callbacks run on |
//! | [`Subscription`] | Handle to cancel an active subscription |
//!
//! ## Feature Flags
//!
//! - **`tokio-scheduler`**: a [`Scheduler`] backed by a tokio runtime handle
//!
//! [`EventManager`]: manager::EventManager
//! [`EventView`]: view::EventView
//! [`BroadcastChannel`]: channel::BroadcastChannel
//! [`OverflowPolicy`]: channel::OverflowPolicy
//! [`Scheduler`]: scheduler::Scheduler
//! [`Subscription`]: subscription::Subscription

pub mod channel;
pub mod config;
pub mod error;
pub mod event;
pub mod lifecycle;
pub mod manager;
pub mod observer;
pub mod pipeline;
pub mod prelude;
pub mod rc;
pub mod registry;
pub mod scheduler;
pub mod subscription;
pub mod view;

pub use prelude::*;

#[cfg(doctest)]
mod readme {
  #![doc = include_str!("../README.md")]
}
