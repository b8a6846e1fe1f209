use crate::builder::ExpiringMapBuilder;
use crate::entry::ExpirationPolicy;
use crate::error::Error;
use crate::iter::{Iter, Keys, Values};
use crate::listener::{ExpirationListener, ListenerHandle};
use crate::shared::MapShared;

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

/// A thread-safe map whose entries expire.
///
/// Entries are tracked in expiration order and removed by a single
/// process-wide worker; expirations are published to registered listeners.
/// Optional features include per-entry expiration policies and durations
/// (variable expiration), size-capped eviction, and lazy population
/// through a loader.
///
/// `ExpiringMap` is a cheaply cloneable handle; clones share the same
/// underlying map.
///
/// # Example
/// ```
/// use expiremap::{ExpirationPolicy, ExpiringMap};
/// use std::time::Duration;
///
/// let map: ExpiringMap<String, u32> = ExpiringMap::builder()
///   .expiration(Duration::from_secs(30))
///   .expiration_policy(ExpirationPolicy::Accessed)
///   .build()
///   .unwrap();
///
/// map.put("connections".to_string(), 42);
/// assert_eq!(map.get(&"connections".to_string()).as_deref(), Some(&42));
/// ```
pub struct ExpiringMap<K, V> {
  shared: Arc<MapShared<K, V>>,
}

impl<K, V> Clone for ExpiringMap<K, V> {
  fn clone(&self) -> Self {
    ExpiringMap { shared: Arc::clone(&self.shared) }
  }
}

impl<K, V> ExpiringMap<K, V>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  /// Creates a map with the defaults: uniform expiration, 60 seconds,
  /// policy [`ExpirationPolicy::Created`].
  pub fn new() -> Self {
    ExpiringMapBuilder::new().build_map()
  }

  /// Returns a builder for configuring a new map.
  pub fn builder() -> ExpiringMapBuilder<K, V> {
    ExpiringMapBuilder::new()
  }

  pub(crate) fn from_shared(shared: Arc<MapShared<K, V>>) -> Self {
    ExpiringMap { shared }
  }

  // -------------------------------------------------------------------------
  // Mapping operations
  // -------------------------------------------------------------------------

  /// Puts `value` for `key`, returning the previous value.
  ///
  /// Resets the entry's expiration unless an entry already exists with an
  /// equal value under policy [`ExpirationPolicy::Created`], in which case
  /// the deadline is left untouched.
  pub fn put(&self, key: K, value: V) -> Option<Arc<V>>
  where
    V: PartialEq,
  {
    self.shared.put(key, value)
  }

  /// Puts `value` for `key` with its own expiration policy and duration.
  ///
  /// Requires variable expiration; fails with
  /// [`Error::VariableExpirationDisabled`] otherwise. An update adopts the
  /// supplied policy and duration for the entry.
  pub fn put_with(
    &self,
    key: K,
    value: V,
    policy: ExpirationPolicy,
    duration: Duration,
  ) -> Result<Option<Arc<V>>, Error>
  where
    V: PartialEq,
  {
    self.shared.put_with(key, value, policy, duration)
  }

  /// Puts `value` for `key` only if no entry exists, returning the current
  /// value otherwise. An existing entry's deadline is not reset.
  pub fn put_if_absent(&self, key: K, value: V) -> Option<Arc<V>> {
    self.shared.put_if_absent(key, value)
  }

  /// Puts every pair, applying the map defaults sampled once for the batch.
  pub fn put_all<I>(&self, entries: I)
  where
    I: IntoIterator<Item = (K, V)>,
    V: PartialEq,
  {
    self.shared.put_all(entries)
  }

  /// Returns the value for `key`, if present.
  ///
  /// Under effective policy [`ExpirationPolicy::Accessed`] the read resets
  /// the entry's deadline. When the map has a loader and the key is
  /// absent, the loader runs (outside the map's locks) and its result is
  /// inserted; concurrent loads for the same key insert only once.
  pub fn get(&self, key: &K) -> Option<Arc<V>> {
    self.shared.get(key)
  }

  /// Removes the entry for `key`, returning its value.
  pub fn remove(&self, key: &K) -> Option<Arc<V>> {
    self.shared.remove(key)
  }

  /// Removes the entry for `key` only if its value equals `expected`.
  pub fn remove_if(&self, key: &K, expected: &V) -> bool
  where
    V: PartialEq,
  {
    self.shared.remove_if(key, expected)
  }

  /// Replaces the value for `key` only if an entry exists.
  pub fn replace(&self, key: K, value: V) -> Option<Arc<V>>
  where
    V: PartialEq,
  {
    self.shared.replace(key, value)
  }

  /// Replaces the value for `key` only if it currently equals `old`.
  pub fn replace_if(&self, key: &K, old: &V, new: V) -> bool
  where
    V: PartialEq,
  {
    self.shared.replace_if(key, old, new)
  }

  /// Removes all entries and cancels their pending expirations. No
  /// listeners fire.
  pub fn clear(&self) {
    self.shared.clear();
  }

  pub fn len(&self) -> usize {
    self.shared.len()
  }

  pub fn is_empty(&self) -> bool {
    self.shared.len() == 0
  }

  pub fn contains_key(&self, key: &K) -> bool {
    self.shared.contains_key(key)
  }

  pub fn contains_value(&self, value: &V) -> bool
  where
    V: PartialEq,
  {
    self.shared.contains_value(value)
  }

  // -------------------------------------------------------------------------
  // Views
  // -------------------------------------------------------------------------

  /// Iterates the entries in expiration order.
  ///
  /// The iterator reads an ordered snapshot and the map size at creation;
  /// advancing it after the map changed (including by a timed expiration)
  /// yields [`Error::ConcurrentModification`] and ends the iteration.
  pub fn iter(&self) -> Iter<K, V> {
    Iter::new(self.shared.clone())
  }

  /// Iterates the keys in expiration order. See [`iter`](Self::iter) for
  /// the consistency contract.
  pub fn keys(&self) -> Keys<K, V> {
    Keys::new(self.shared.clone())
  }

  /// Iterates the values in expiration order. See [`iter`](Self::iter) for
  /// the consistency contract.
  pub fn values(&self) -> Values<K, V> {
    Values::new(self.shared.clone())
  }

  // -------------------------------------------------------------------------
  // Expiration control
  // -------------------------------------------------------------------------

  /// Restarts the expiration clock for `key`, as if the entry had just
  /// been created. Absent keys are ignored.
  pub fn reset_expiration(&self, key: &K) {
    self.shared.reset_expiration(key);
  }

  /// The map's default entry lifetime.
  pub fn expiration(&self) -> Duration {
    self.shared.expiration()
  }

  /// The map's default expiration policy.
  pub fn expiration_policy(&self) -> ExpirationPolicy {
    self.shared.expiration_policy()
  }

  /// The configured lifetime of the entry for `key`.
  pub fn expiration_of(&self, key: &K) -> Result<Duration, Error> {
    self.shared.expiration_of(key)
  }

  /// The effective expiration policy of the entry for `key`.
  pub fn expiration_policy_of(&self, key: &K) -> Result<ExpirationPolicy, Error> {
    self.shared.expiration_policy_of(key)
  }

  /// Time remaining until the entry for `key` expires. An entry whose
  /// deadline has passed but which has not yet been swept reports zero.
  pub fn expected_expiration(&self, key: &K) -> Result<Duration, Error> {
    self.shared.expected_expiration(key)
  }

  /// Updates the map's default entry lifetime. Requires variable
  /// expiration; existing entries are unaffected.
  pub fn set_expiration(&self, duration: Duration) -> Result<(), Error> {
    self.shared.set_expiration(duration)
  }

  /// Updates the map's default expiration policy. Entries under uniform
  /// expiration share the map's policy and inherit the change immediately.
  pub fn set_expiration_policy(&self, policy: ExpirationPolicy) {
    self.shared.set_expiration_policy(policy);
  }

  /// Sets the lifetime of the entry for `key` and restarts its clock.
  /// Requires variable expiration.
  pub fn set_expiration_of(&self, key: &K, duration: Duration) -> Result<(), Error> {
    self.shared.set_expiration_of(key, duration)
  }

  /// Sets the expiration policy of the entry for `key` and restarts its
  /// clock. Requires variable expiration.
  pub fn set_expiration_policy_of(&self, key: &K, policy: ExpirationPolicy) -> Result<(), Error> {
    self.shared.set_expiration_policy_of(key, policy)
  }

  // -------------------------------------------------------------------------
  // Listeners
  // -------------------------------------------------------------------------

  /// Registers a synchronous expiration listener. Delivery is adaptive:
  /// fast listeners stay inline on the expiration worker, slow ones move
  /// to the dispatch pool after their first timed invocation.
  pub fn add_expiration_listener<L>(&self, listener: L) -> ListenerHandle
  where
    L: ExpirationListener<K, V> + 'static,
  {
    self.shared.listeners.add_sync(Arc::new(listener))
  }

  /// Registers an asynchronous expiration listener, always invoked on the
  /// dispatch pool.
  pub fn add_async_expiration_listener<L>(&self, listener: L) -> ListenerHandle
  where
    L: ExpirationListener<K, V> + 'static,
  {
    self.shared.listeners.add_async(Arc::new(listener))
  }

  /// Removes a synchronous listener. Returns whether it was registered.
  pub fn remove_expiration_listener(&self, handle: ListenerHandle) -> bool {
    self.shared.listeners.remove_sync(handle)
  }

  /// Removes an asynchronous listener. Returns whether it was registered.
  pub fn remove_async_expiration_listener(&self, handle: ListenerHandle) -> bool {
    self.shared.listeners.remove_async(handle)
  }
}

impl<K, V> Default for ExpiringMap<K, V>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  fn default() -> Self {
    Self::new()
  }
}

impl<K, V> fmt::Debug for ExpiringMap<K, V>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ExpiringMap")
      .field("len", &self.len())
      .field("variable_expiration", &self.shared.variable)
      .field("max_size", &self.shared.max_size)
      .field("expiration", &self.expiration())
      .finish_non_exhaustive()
  }
}
