use std::{fmt, sync::Arc};

use super::inbox::Inbox;
use crate::subscription::Subscription;

/// Cancellation handle for one subscriber of a
/// [`BroadcastChannel`](super::BroadcastChannel).
///
/// Clones refer to the same subscriber; unsubscribing through any of them
/// cancels it for all.
#[derive(Clone)]
pub struct EventSubscription {
  inbox: Option<Arc<Inbox>>,
}

impl EventSubscription {
  pub(crate) fn new(inbox: Arc<Inbox>) -> Self { EventSubscription { inbox: Some(inbox) } }

  /// A subscription that was over before it started.
  pub(crate) fn closed() -> Self { EventSubscription { inbox: None } }

  /// Events this subscriber lost to its overflow policy.
  pub fn dropped_events(&self) -> u64 { self.inbox.as_ref().map_or(0, |inbox| inbox.dropped()) }

  /// Position in the channel's subscriber table, `None` if the subscription
  /// never attached.
  pub fn id(&self) -> Option<usize> { self.inbox.as_ref().map(|inbox| inbox.id()) }
}

impl Subscription for EventSubscription {
  fn unsubscribe(self) {
    if let Some(inbox) = self.inbox {
      inbox.cancel();
    }
  }

  fn is_closed(&self) -> bool { self.inbox.as_ref().map_or(true, |inbox| inbox.is_closed()) }
}

impl fmt::Debug for EventSubscription {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("EventSubscription")
      .field("id", &self.id())
      .field("closed", &self.is_closed())
      .field("dropped_events", &self.dropped_events())
      .finish()
  }
}
