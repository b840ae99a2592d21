use std::{
  future::Future,
  pin::Pin,
  task::{ready, Context, Poll},
};

use futures::Stream;
use pin_project_lite::pin_project;

use super::EventManager;
use crate::{event::DynEvent, lifecycle::LifecycleState};

pin_project! {
  /// Future returned by [`EventManager::forward`].
  ///
  /// Pulls events from an async source and hands each one to
  /// [`EventManager::handle`]. Resolves with the number of events forwarded
  /// once the source ends, or as soon as the manager has left the `Active`
  /// state; the source is not polled again after that.
  #[must_use = "futures do nothing unless you `.await` or poll them"]
  pub struct Forward<S> {
    #[pin]
    source: S,
    manager: EventManager,
    forwarded: usize,
  }
}

impl<S> Forward<S> {
  pub(crate) fn new(manager: EventManager, source: S) -> Self { Forward { source, manager, forwarded: 0 } }
}

impl<S> Future for Forward<S>
where
  S: Stream<Item = DynEvent>,
{
  type Output = usize;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<usize> {
    let mut this = self.project();
    loop {
      if this.manager.state() != LifecycleState::Active {
        return Poll::Ready(*this.forwarded);
      }
      match ready!(this.source.as_mut().poll_next(cx)) {
        Some(event) => {
          this.manager.handle(event);
          *this.forwarded += 1;
        }
        None => {
          tracing::debug!(forwarded = *this.forwarded, "event source exhausted");
          return Poll::Ready(*this.forwarded);
        }
      }
    }
  }
}
