use std::sync::Arc;

use smallvec::SmallVec;

use super::inbox::Inbox;
use crate::subscription::DynamicSubscriptions;

/// Snapshot of the subscriber table taken under the channel lock.
pub(crate) type InboxList = SmallVec<[Arc<Inbox>; 4]>;

/// The channel's subscriber table.
///
/// Broadcasting never happens while the table is locked: the channel takes a
/// snapshot and pushes into each inbox afterwards, so an observer running
/// inline may subscribe or unsubscribe freely.
#[derive(Default)]
pub(crate) struct Subscribers {
  inner: DynamicSubscriptions<Arc<Inbox>>,
}

impl Subscribers {
  #[inline]
  pub(crate) fn reserve_id(&mut self) -> usize { self.inner.reserve_id() }

  #[inline]
  pub(crate) fn insert(&mut self, inbox: Arc<Inbox>) { self.inner.insert(inbox.id(), inbox); }

  #[inline]
  pub(crate) fn remove(&mut self, id: usize) -> Option<Arc<Inbox>> { self.inner.remove(id) }

  #[inline]
  pub(crate) fn len(&self) -> usize { self.inner.len() }

  /// Current subscribers, in subscription order.
  pub(crate) fn snapshot(&self) -> InboxList { self.inner.iter().cloned().collect() }

  /// Remove and return every subscriber.
  pub(crate) fn take_all(&mut self) -> InboxList { self.inner.drain().collect() }
}
