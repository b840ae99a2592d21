//! Error types
//!
//! Each concern has its own enum. Only [`RegistryError`] is ever returned to
//! a caller of the manager; delivery failures travel in-band as
//! [`ExceptionEvent`](crate::event::ExceptionEvent)s and stream failures
//! reach observers through [`Observer::error`](crate::observer::Observer::error).

use std::any::{Any, TypeId};

use thiserror::Error;

/// Boxed error produced by user supplied pipeline stages.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A failure raised while pushing an event into the channel.
#[derive(Debug, Error)]
pub enum DeliveryError {
  /// A construction-time pipeline stage returned an error.
  #[error("event pipeline failed: {0}")]
  Pipeline(#[source] BoxError),
  /// Something on the producer path panicked.
  #[error("event delivery panicked: {0}")]
  Panicked(String),
}

impl DeliveryError {
  pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
    DeliveryError::Panicked(panic_message(payload.as_ref()))
  }
}

/// Terminal failure of a single subscription.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum StreamError {
  #[error("subscriber fell behind by more than {capacity} events")]
  Overflow { capacity: usize },
  #[error("scheduler no longer accepts work")]
  SchedulerUnavailable,
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum RegistryError {
  /// The object handed to the registry exposes no known callback shape.
  #[error("listener object {type_id:?} does not implement EventListener")]
  UnsupportedCapability { type_id: TypeId },
  #[error("event manager has been disposed")]
  Disposed,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchedulerError {
  #[error("scheduler has been disposed")]
  Disposed,
  #[error("failed to start scheduler: {0}")]
  Spawn(String),
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
  if let Some(msg) = payload.downcast_ref::<&'static str>() {
    (*msg).to_owned()
  } else if let Some(msg) = payload.downcast_ref::<String>() {
    msg.clone()
  } else {
    "non-string panic payload".to_owned()
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn panic_payloads() {
    let caught = std::panic::catch_unwind(|| panic!("boom")).unwrap_err();
    assert_eq!(DeliveryError::from_panic(caught).to_string(), "event delivery panicked: boom");

    let caught = std::panic::catch_unwind(|| panic!("{} {}", "formatted", 1)).unwrap_err();
    assert_eq!(panic_message(caught.as_ref()), "formatted 1");

    let caught = std::panic::catch_unwind(|| std::panic::panic_any(7_u8)).unwrap_err();
    assert_eq!(panic_message(caught.as_ref()), "non-string panic payload");
  }

  #[test]
  fn pipeline_error_keeps_source() {
    use std::error::Error as _;
    let err = DeliveryError::Pipeline("bad payload".into());
    assert_eq!(err.to_string(), "event pipeline failed: bad payload");
    assert!(err.source().is_some());
  }
}
