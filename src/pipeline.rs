//! Construction-time event pipeline
//!
//! A [`Pipeline`] is a fixed chain of stages that every event passes through
//! on the producer thread, before it reaches the broadcast channel. It is set
//! once through [`ManagerConfig`](crate::config::ManagerConfig) and shared by
//! every subscriber, unlike the per-subscriber transforms of
//! [`EventView`](crate::view::EventView).
//!
//! A stage that returns an error, or panics, stops the event; the manager then
//! publishes an [`ExceptionEvent`](crate::event::ExceptionEvent) in its place.

use std::{fmt, sync::Arc};

use crate::{
  error::{BoxError, DeliveryError},
  event::DynEvent,
};

type Stage = Arc<dyn Fn(DynEvent) -> Result<Option<DynEvent>, BoxError> + Send + Sync>;

#[derive(Clone, Default)]
pub struct Pipeline {
  stages: Vec<Stage>,
}

impl Pipeline {
  /// The pipeline that passes every event through untouched.
  pub fn identity() -> Self { Self::default() }

  pub fn is_identity(&self) -> bool { self.stages.is_empty() }

  /// Drop events for which `predicate` returns `false`.
  pub fn filter<F>(self, predicate: F) -> Self
  where
    F: Fn(&DynEvent) -> bool + Send + Sync + 'static,
  {
    self.stage(move |event| Ok(predicate(&event).then_some(event)))
  }

  pub fn map<F>(self, f: F) -> Self
  where
    F: Fn(DynEvent) -> DynEvent + Send + Sync + 'static,
  {
    self.stage(move |event| Ok(Some(f(event))))
  }

  /// A fallible transform. An `Err` is reported as
  /// [`DeliveryError::Pipeline`].
  pub fn try_map<F, E>(self, f: F) -> Self
  where
    F: Fn(DynEvent) -> Result<DynEvent, E> + Send + Sync + 'static,
    E: Into<BoxError> + 'static,
  {
    self.stage(move |event| f(event).map(Some).map_err(Into::into))
  }

  pub fn tap<F>(self, f: F) -> Self
  where
    F: Fn(&DynEvent) + Send + Sync + 'static,
  {
    self.stage(move |event| {
      f(&event);
      Ok(Some(event))
    })
  }

  fn stage<F>(mut self, stage: F) -> Self
  where
    F: Fn(DynEvent) -> Result<Option<DynEvent>, BoxError> + Send + Sync + 'static,
  {
    self.stages.push(Arc::new(stage));
    self
  }

  /// Run `event` through every stage. `Ok(None)` means a filter dropped it.
  pub(crate) fn apply(&self, event: DynEvent) -> Result<Option<DynEvent>, DeliveryError> {
    let mut event = event;
    for stage in &self.stages {
      match stage(event).map_err(DeliveryError::Pipeline)? {
        Some(next) => event = next,
        None => return Ok(None),
      }
    }
    Ok(Some(event))
  }
}

impl fmt::Debug for Pipeline {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Pipeline").field("stages", &self.stages.len()).finish()
  }
}

#[cfg(test)]
mod test {
  use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
  };

  use super::*;
  use crate::event::{Shutdown, SourceId};

  #[derive(Debug)]
  struct Raw {
    source: SourceId,
    payload: &'static str,
  }
  crate::impl_event!(Raw, source = source);

  fn raw(payload: &'static str) -> DynEvent { Arc::new(Raw { source: SourceId::new(9), payload }) }

  fn payload(event: &DynEvent) -> &'static str { event.downcast_ref::<Raw>().map_or("", |r| r.payload) }

  #[test]
  fn identity_passes_through() {
    let pipeline = Pipeline::identity();
    assert!(pipeline.is_identity());
    let event = raw("x");
    let out = pipeline.apply(event.clone()).unwrap().unwrap();
    assert!(Arc::ptr_eq(&out, &event));
  }

  #[test]
  fn stages_run_in_order() {
    let seen = Arc::new(AtomicUsize::new(0));
    let c_seen = seen.clone();
    let pipeline = Pipeline::identity()
      .tap(move |_| {
        c_seen.fetch_add(1, Ordering::Relaxed);
      })
      .filter(|e| payload(e) != "drop")
      .map(|e| if payload(&e) == "a" { raw("b") } else { e });
    assert!(!pipeline.is_identity());

    let out = pipeline.apply(raw("a")).unwrap().unwrap();
    assert_eq!(payload(&out), "b");
    assert!(pipeline.apply(raw("drop")).unwrap().is_none());
    assert_eq!(seen.load(Ordering::Relaxed), 2);
  }

  #[test]
  fn failing_stage_stops_the_event() {
    let reached = Arc::new(AtomicUsize::new(0));
    let c_reached = reached.clone();
    let pipeline = Pipeline::identity()
      .try_map(|e| if payload(&e) == "bad" { Err("malformed payload") } else { Ok(e) })
      .tap(move |_| {
        c_reached.fetch_add(1, Ordering::Relaxed);
      });

    let err = pipeline.apply(raw("bad")).unwrap_err();
    assert!(matches!(err, DeliveryError::Pipeline(_)));
    assert_eq!(err.to_string(), "event pipeline failed: malformed payload");
    assert_eq!(reached.load(Ordering::Relaxed), 0);

    let shutdown: DynEvent = Arc::new(Shutdown::new(SourceId::new(9)));
    assert!(pipeline.apply(shutdown).unwrap().is_some());
    assert_eq!(reached.load(Ordering::Relaxed), 1);
  }
}
