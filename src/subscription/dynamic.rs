use smallvec::SmallVec;

/// A container of items keyed by a monotonically increasing id.
///
/// The channel uses it for its subscriber table: a subscriber needs its id
/// before it exists (it removes itself by id), hence the `reserve_id()` +
/// `insert()` pair.
pub(crate) struct DynamicSubscriptions<U> {
  next_id: usize,
  items: SmallVec<[(usize, U); 4]>,
}

impl<U> Default for DynamicSubscriptions<U> {
  fn default() -> Self { Self { next_id: 0, items: SmallVec::new() } }
}

impl<U> DynamicSubscriptions<U> {
  /// Reserve the next ID without adding an item.
  #[inline]
  pub(crate) fn reserve_id(&mut self) -> usize {
    let id = self.next_id;
    self.next_id += 1;
    id
  }

  /// Insert an item with an ID obtained from `reserve_id()`.
  #[inline]
  pub(crate) fn insert(&mut self, id: usize, item: U) { self.items.push((id, item)); }

  /// Remove an item by ID, preserving the order of the rest.
  pub(crate) fn remove(&mut self, id: usize) -> Option<U> {
    self
      .items
      .iter()
      .position(|(i, _)| *i == id)
      .map(|pos| self.items.remove(pos).1)
  }

  #[inline]
  pub(crate) fn len(&self) -> usize { self.items.len() }

  #[inline]
  pub(crate) fn drain(&mut self) -> impl Iterator<Item = U> + '_ {
    self.items.drain(..).map(|(_, item)| item)
  }

  /// Iterate in insertion order.
  #[inline]
  pub(crate) fn iter(&self) -> impl Iterator<Item = &U> { self.items.iter().map(|(_, item)| item) }
}

#[cfg(test)]
mod test {
  use super::*;

  fn add<U>(subs: &mut DynamicSubscriptions<U>, item: U) -> usize {
    let id = subs.reserve_id();
    subs.insert(id, item);
    id
  }

  #[test]
  fn ids_are_never_reused() {
    let mut subs = DynamicSubscriptions::default();
    let a = add(&mut subs, 'a');
    subs.remove(a);
    let b = add(&mut subs, 'b');
    assert_ne!(a, b);
    assert_eq!(subs.remove(a), None);
    assert_eq!(subs.remove(b), Some('b'));
  }

  #[test]
  fn drain_empties_in_order() {
    let mut subs = DynamicSubscriptions::default();
    for c in ['x', 'y', 'z'] {
      add(&mut subs, c);
    }
    assert_eq!(subs.drain().collect::<String>(), "xyz");
    assert_eq!(subs.len(), 0);
  }
}
