/// What a subscriber's inbox does when its consumer falls behind.
///
/// `capacity` counts the events accepted for one subscriber that it has not
/// finished handling yet: the queued ones plus the one its callback is
/// currently running on. The producer is never blocked under any policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
  /// Queue without bound.
  #[default]
  Buffer,
  /// Discard the incoming event when full.
  DropLatest { capacity: usize },
  /// Discard the oldest queued event when full. When only the event in hand
  /// occupies the budget, the incoming event is discarded instead.
  DropOldest { capacity: usize },
  /// Terminate the subscriber with
  /// [`StreamError::Overflow`](crate::error::StreamError::Overflow) when
  /// full.
  Error { capacity: usize },
}

/// Outcome of offering one more event to an inbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
  Accept,
  DropIncoming,
  EvictOldest,
  Overflow { capacity: usize },
}

impl OverflowPolicy {
  pub fn capacity(&self) -> Option<usize> {
    match *self {
      OverflowPolicy::Buffer => None,
      OverflowPolicy::DropLatest { capacity }
      | OverflowPolicy::DropOldest { capacity }
      | OverflowPolicy::Error { capacity } => Some(capacity),
    }
  }

  /// `pending` is queued plus in-hand events, `queued` only the queued ones.
  pub(crate) fn admit(&self, pending: usize, queued: usize) -> Admission {
    match *self {
      OverflowPolicy::Buffer => Admission::Accept,
      OverflowPolicy::DropLatest { capacity } if pending >= capacity => Admission::DropIncoming,
      OverflowPolicy::DropOldest { capacity } if pending >= capacity => {
        if queued > 0 {
          Admission::EvictOldest
        } else {
          Admission::DropIncoming
        }
      }
      OverflowPolicy::Error { capacity } if pending >= capacity => Admission::Overflow { capacity },
      _ => Admission::Accept,
    }
  }
}
