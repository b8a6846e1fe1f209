//! Iterator views over a map's contents.
//!
//! Every view captures an ordered snapshot of the entries plus the map
//! size at creation. Advancing a view after the live size diverged from
//! the captured one, whether through another thread or a timed
//! expiration, yields [`Error::ConcurrentModification`] once and then ends
//! the iteration.

use crate::error::Error;
use crate::shared::MapShared;

use std::hash::Hash;
use std::sync::Arc;

/// Iterates `(key, value)` pairs in expiration order.
pub struct Iter<K, V> {
  shared: Arc<MapShared<K, V>>,
  entries: Vec<(K, Arc<V>)>,
  saved_len: usize,
  pos: usize,
  poisoned: bool,
}

impl<K, V> Iter<K, V>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  pub(crate) fn new(shared: Arc<MapShared<K, V>>) -> Self {
    let (entries, saved_len) = shared.snapshot();
    Self { shared, entries, saved_len, pos: 0, poisoned: false }
  }
}

impl<K, V> Iterator for Iter<K, V>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  type Item = Result<(K, Arc<V>), Error>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.poisoned || self.pos >= self.entries.len() {
      return None;
    }
    if self.shared.len() != self.saved_len {
      self.poisoned = true;
      return Some(Err(Error::ConcurrentModification));
    }
    let item = self.entries[self.pos].clone();
    self.pos += 1;
    Some(Ok(item))
  }
}

/// Iterates keys in expiration order.
pub struct Keys<K, V> {
  inner: Iter<K, V>,
}

impl<K, V> Keys<K, V>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  pub(crate) fn new(shared: Arc<MapShared<K, V>>) -> Self {
    Self { inner: Iter::new(shared) }
  }
}

impl<K, V> Iterator for Keys<K, V>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  type Item = Result<K, Error>;

  fn next(&mut self) -> Option<Self::Item> {
    Some(self.inner.next()?.map(|(key, _)| key))
  }
}

/// Iterates values in expiration order.
pub struct Values<K, V> {
  inner: Iter<K, V>,
}

impl<K, V> Values<K, V>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  pub(crate) fn new(shared: Arc<MapShared<K, V>>) -> Self {
    Self { inner: Iter::new(shared) }
  }
}

impl<K, V> Iterator for Values<K, V>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  type Item = Result<Arc<V>, Error>;

  fn next(&mut self) -> Option<Self::Item> {
    Some(self.inner.next()?.map(|(_, value)| value))
  }
}
