//! Subscription handles
//!
//! A subscription is the cancellable link between a view and its observer.

mod dynamic;
pub(crate) use dynamic::DynamicSubscriptions;

/// Handle returned by `subscribe` that allows cancelling the subscription
/// before the stream has ended.
pub trait Subscription {
  /// Stop delivery. Once this returns no new callback invocation starts; an
  /// invocation already running on the scheduler may still finish.
  fn unsubscribe(self);

  fn is_closed(&self) -> bool;

  /// Activates "RAII" behavior for this subscription: `unsubscribe()` is
  /// called as soon as the returned guard goes out of scope.
  ///
  /// **Attention:** if the guard is not bound to a variable it is dropped
  /// immediately, which is probably not what you want.
  fn unsubscribe_when_dropped(self) -> SubscriptionGuard<Self>
  where
    Self: Sized,
  {
    SubscriptionGuard::new(self)
  }
}

impl<T: Subscription> Subscription for Option<T> {
  fn unsubscribe(self) {
    if let Some(inner) = self {
      inner.unsubscribe()
    }
  }

  fn is_closed(&self) -> bool { self.as_ref().map_or(true, Subscription::is_closed) }
}

/// An RAII implementation of a "scoped subscribed" of a subscription.
/// When this structure is dropped (falls out of scope), the subscription will
/// be unsubscribed.
#[derive(Debug)]
#[must_use]
pub struct SubscriptionGuard<T: Subscription>(Option<T>);

impl<T: Subscription> SubscriptionGuard<T> {
  pub fn new(subscription: T) -> SubscriptionGuard<T> { SubscriptionGuard(Some(subscription)) }

  pub fn get(&self) -> &T {
    match &self.0 {
      Some(subscription) => subscription,
      None => unreachable!("guard is only emptied on drop or release"),
    }
  }

  /// Gives up the guard without cancelling the subscription.
  pub fn release(mut self) -> T {
    match self.0.take() {
      Some(subscription) => subscription,
      None => unreachable!("guard is only emptied on drop or release"),
    }
  }
}

impl<T: Subscription> Drop for SubscriptionGuard<T> {
  #[inline]
  fn drop(&mut self) {
    if let Some(subscription) = self.0.take() {
      subscription.unsubscribe()
    }
  }
}
