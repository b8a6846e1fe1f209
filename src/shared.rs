use crate::entry::{ExpirationPolicy, ExpiringEntry, PolicyCell};
use crate::error::Error;
use crate::index::EntryIndex;
use crate::listener::ListenerRegistry;
use crate::loader::Loader;
use crate::runtime;
use crate::time::Ticker;

use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use parking_lot::RwLock;

/// The internal, thread-safe core of an expiring map.
///
/// A single reader/writer lock guards the entry index and all per-entry
/// mutable state. Lookups take the reader lock; every mutation, including
/// the expiration worker's sweep, takes the writer lock. Listener
/// notification always happens after the lock is released so a callback
/// can never deadlock against a map operation.
pub(crate) struct MapShared<K, V> {
  pub(crate) index: RwLock<EntryIndex<K, V>>,
  /// Map-level expiration policy. Shared with every entry under uniform
  /// expiration; the default for new entries under variable expiration.
  pub(crate) policy: Arc<PolicyCell>,
  /// Map-level entry lifetime in nanoseconds. Shared/defaulted as above.
  pub(crate) duration_nanos: Arc<AtomicU64>,
  pub(crate) variable: bool,
  pub(crate) max_size: Option<usize>,
  pub(crate) loader: Option<Loader<K, V>>,
  pub(crate) listeners: ListenerRegistry<K, V>,
  pub(crate) ticker: Arc<dyn Ticker>,
}

impl<K, V> MapShared<K, V>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  // -------------------------------------------------------------------------
  // Mapping surface
  // -------------------------------------------------------------------------

  pub(crate) fn put(self: &Arc<Self>, key: K, value: V) -> Option<Arc<V>>
  where
    V: PartialEq,
  {
    let policy = self.policy.get();
    let duration = self.duration_nanos.load(Ordering::Acquire);
    let mut evicted = Vec::new();
    let previous = {
      let mut index = self.index.write();
      self.put_locked(&mut index, key, value, policy, duration, false, &mut evicted)
    };
    self.notify_evicted(evicted);
    previous
  }

  /// Puts a value with its own policy and duration. The entry (new or
  /// updated) adopts them into its private cells, so this requires
  /// variable expiration.
  pub(crate) fn put_with(
    self: &Arc<Self>,
    key: K,
    value: V,
    policy: ExpirationPolicy,
    duration: Duration,
  ) -> Result<Option<Arc<V>>, Error>
  where
    V: PartialEq,
  {
    if !self.variable {
      return Err(Error::VariableExpirationDisabled);
    }
    let mut evicted = Vec::new();
    let previous = {
      let mut index = self.index.write();
      self.put_locked(
        &mut index,
        key,
        value,
        policy,
        duration.as_nanos() as u64,
        true,
        &mut evicted,
      )
    };
    self.notify_evicted(evicted);
    Ok(previous)
  }

  pub(crate) fn put_if_absent(self: &Arc<Self>, key: K, value: V) -> Option<Arc<V>> {
    let mut evicted = Vec::new();
    let existing = {
      let mut index = self.index.write();
      match index.get(&key).cloned() {
        Some(entry) => Some(entry.value()),
        None => {
          let policy = self.policy.get();
          let duration = self.duration_nanos.load(Ordering::Acquire);
          self.insert_new_locked(&mut index, key, value, policy, duration, &mut evicted);
          None
        }
      }
    };
    self.notify_evicted(evicted);
    existing
  }

  pub(crate) fn put_all<I>(self: &Arc<Self>, entries: I)
  where
    I: IntoIterator<Item = (K, V)>,
    V: PartialEq,
  {
    // The defaults are sampled once for the whole batch.
    let policy = self.policy.get();
    let duration = self.duration_nanos.load(Ordering::Acquire);
    let mut evicted = Vec::new();
    {
      let mut index = self.index.write();
      for (key, value) in entries {
        self.put_locked(&mut index, key, value, policy, duration, false, &mut evicted);
      }
    }
    self.notify_evicted(evicted);
  }

  pub(crate) fn get(self: &Arc<Self>, key: &K) -> Option<Arc<V>> {
    let found = self.index.read().get(key).cloned();
    if let Some(entry) = found {
      let value = entry.value();
      if entry.policy.get() == ExpirationPolicy::Accessed {
        let mut index = self.index.write();
        // The entry may have expired or been replaced between the locks.
        let still_current = index.get(key).map_or(false, |current| Arc::ptr_eq(current, &entry));
        if still_current {
          self.reset_entry_locked(&mut index, &entry, false);
        }
      }
      return Some(value);
    }

    let loader = self.loader.clone()?;
    match loader {
      Loader::Plain(load) => {
        let value = load(key);
        Some(self.store_loaded(key, value, None, None))
      }
      Loader::Expiring(load) => {
        let (value, policy, duration) = load(key)?.into_parts();
        Some(self.store_loaded(key, value, policy, duration))
      }
    }
  }

  pub(crate) fn remove(self: &Arc<Self>, key: &K) -> Option<Arc<V>> {
    let mut index = self.index.write();
    let entry = index.remove(key)?;
    if entry.cancel(false, self.ticker.as_ref()) {
      if let Some(first) = index.first() {
        self.schedule_entry(&first);
      }
    }
    Some(entry.value())
  }

  pub(crate) fn remove_if(self: &Arc<Self>, key: &K, expected: &V) -> bool
  where
    V: PartialEq,
  {
    let mut index = self.index.write();
    let matches = index.get(key).map_or(false, |entry| *entry.value() == *expected);
    if !matches {
      return false;
    }
    if let Some(entry) = index.remove(key) {
      if entry.cancel(false, self.ticker.as_ref()) {
        if let Some(first) = index.first() {
          self.schedule_entry(&first);
        }
      }
    }
    true
  }

  pub(crate) fn replace(self: &Arc<Self>, key: K, value: V) -> Option<Arc<V>>
  where
    V: PartialEq,
  {
    let policy = self.policy.get();
    let duration = self.duration_nanos.load(Ordering::Acquire);
    let mut evicted = Vec::new();
    let previous = {
      let mut index = self.index.write();
      if !index.contains_key(&key) {
        return None;
      }
      self.put_locked(&mut index, key, value, policy, duration, false, &mut evicted)
    };
    self.notify_evicted(evicted);
    previous
  }

  pub(crate) fn replace_if(self: &Arc<Self>, key: &K, old: &V, new: V) -> bool
  where
    V: PartialEq,
  {
    let policy = self.policy.get();
    let duration = self.duration_nanos.load(Ordering::Acquire);
    let mut evicted = Vec::new();
    let replaced = {
      let mut index = self.index.write();
      let matches = index.get(key).map_or(false, |entry| *entry.value() == *old);
      if matches {
        self.put_locked(&mut index, key.clone(), new, policy, duration, false, &mut evicted);
        true
      } else {
        false
      }
    };
    self.notify_evicted(evicted);
    replaced
  }

  pub(crate) fn clear(&self) {
    let mut index = self.index.write();
    for entry in index.entries_in_order() {
      entry.cancel(false, self.ticker.as_ref());
    }
    index.clear();
  }

  pub(crate) fn len(&self) -> usize {
    self.index.read().len()
  }

  pub(crate) fn contains_key(&self, key: &K) -> bool {
    self.index.read().contains_key(key)
  }

  pub(crate) fn contains_value(&self, value: &V) -> bool
  where
    V: PartialEq,
  {
    let index = self.index.read();
    index.entries_in_order().iter().any(|entry| *entry.value() == *value)
  }

  // -------------------------------------------------------------------------
  // Expiration surface
  // -------------------------------------------------------------------------

  pub(crate) fn reset_expiration(self: &Arc<Self>, key: &K) {
    let mut index = self.index.write();
    if let Some(entry) = index.get(key).cloned() {
      self.reset_entry_locked(&mut index, &entry, false);
    }
  }

  pub(crate) fn expiration(&self) -> Duration {
    Duration::from_nanos(self.duration_nanos.load(Ordering::Acquire))
  }

  pub(crate) fn expiration_policy(&self) -> ExpirationPolicy {
    self.policy.get()
  }

  pub(crate) fn expiration_of(&self, key: &K) -> Result<Duration, Error> {
    let index = self.index.read();
    let entry = index.get(key).ok_or(Error::KeyNotFound)?;
    Ok(Duration::from_nanos(entry.duration_nanos.load(Ordering::Acquire)))
  }

  pub(crate) fn expiration_policy_of(&self, key: &K) -> Result<ExpirationPolicy, Error> {
    let index = self.index.read();
    let entry = index.get(key).ok_or(Error::KeyNotFound)?;
    Ok(entry.policy.get())
  }

  /// Time remaining until the entry's deadline. An entry that is overdue
  /// but not yet swept reports zero.
  pub(crate) fn expected_expiration(&self, key: &K) -> Result<Duration, Error> {
    let index = self.index.read();
    let entry = index.get(key).ok_or(Error::KeyNotFound)?;
    Ok(Duration::from_nanos(entry.expected_at().saturating_sub(self.ticker.now())))
  }

  pub(crate) fn set_expiration(&self, duration: Duration) -> Result<(), Error> {
    if !self.variable {
      return Err(Error::VariableExpirationDisabled);
    }
    self.duration_nanos.store(duration.as_nanos() as u64, Ordering::Release);
    Ok(())
  }

  /// Updates the map-level policy. Uniform entries share the cell and
  /// inherit immediately; existing variable entries are unaffected.
  pub(crate) fn set_expiration_policy(&self, policy: ExpirationPolicy) {
    self.policy.set(policy);
  }

  pub(crate) fn set_expiration_of(self: &Arc<Self>, key: &K, duration: Duration) -> Result<(), Error> {
    if !self.variable {
      return Err(Error::VariableExpirationDisabled);
    }
    let mut index = self.index.write();
    let entry = index.get(key).cloned().ok_or(Error::KeyNotFound)?;
    entry.duration_nanos.store(duration.as_nanos() as u64, Ordering::Release);
    self.reset_entry_locked(&mut index, &entry, true);
    Ok(())
  }

  pub(crate) fn set_expiration_policy_of(
    self: &Arc<Self>,
    key: &K,
    policy: ExpirationPolicy,
  ) -> Result<(), Error> {
    if !self.variable {
      return Err(Error::VariableExpirationDisabled);
    }
    let mut index = self.index.write();
    let entry = index.get(key).cloned().ok_or(Error::KeyNotFound)?;
    entry.policy.set(policy);
    self.reset_entry_locked(&mut index, &entry, true);
    Ok(())
  }

  /// An ordered snapshot for the iterator views.
  pub(crate) fn snapshot(&self) -> (Vec<(K, Arc<V>)>, usize) {
    let index = self.index.read();
    let entries = index
      .entries_in_order()
      .iter()
      .map(|entry| (entry.key.clone(), entry.value()))
      .collect();
    (entries, index.len())
  }

  // -------------------------------------------------------------------------
  // Engine internals
  // -------------------------------------------------------------------------

  /// Core of every put. Holds the writer lock via `index`; collected
  /// size-cap victims are notified by the caller after unlocking.
  fn put_locked(
    self: &Arc<Self>,
    index: &mut EntryIndex<K, V>,
    key: K,
    value: V,
    policy: ExpirationPolicy,
    duration_nanos: u64,
    adopt: bool,
    evicted: &mut Vec<Arc<ExpiringEntry<K, V>>>,
  ) -> Option<Arc<V>>
  where
    V: PartialEq,
  {
    match index.get(&key).cloned() {
      None => {
        self.insert_new_locked(index, key, value, policy, duration_nanos, evicted);
        None
      }
      Some(entry) => {
        let previous = entry.value();
        // An idempotent put under CREATED keeps the deadline.
        if policy != ExpirationPolicy::Accessed && *previous == value {
          return Some(previous);
        }
        if adopt {
          entry.policy.set(policy);
          entry.duration_nanos.store(duration_nanos, Ordering::Release);
        }
        entry.set_value(value);
        self.reset_entry_locked(index, &entry, false);
        Some(previous)
      }
    }
  }

  fn insert_new_locked(
    self: &Arc<Self>,
    index: &mut EntryIndex<K, V>,
    key: K,
    value: V,
    policy: ExpirationPolicy,
    duration_nanos: u64,
    evicted: &mut Vec<Arc<ExpiringEntry<K, V>>>,
  ) -> Arc<ExpiringEntry<K, V>> {
    let (policy_cell, duration_cell) = if self.variable {
      (Arc::new(PolicyCell::new(policy)), Arc::new(AtomicU64::new(duration_nanos)))
    } else {
      (self.policy.clone(), self.duration_nanos.clone())
    };
    let entry = Arc::new(ExpiringEntry::new(
      key,
      value,
      policy_cell,
      duration_cell,
      self.ticker.as_ref(),
    ));
    index.insert(entry.clone());

    let is_head = index.first().map_or(false, |first| Arc::ptr_eq(&first, &entry));
    if is_head {
      self.schedule_entry(&entry);
    }

    if let Some(max) = self.max_size {
      while index.len() > max {
        let Some(head) = index.first() else { break };
        index.remove(&head.key);
        if head.cancel(false, self.ticker.as_ref()) {
          if let Some(next) = index.first() {
            self.schedule_entry(&next);
          }
        }
        evicted.push(head);
      }
    }
    entry
  }

  /// The loader's absent-check-and-insert. The loader itself already ran
  /// outside any lock; the first inserter wins and losers adopt its value.
  fn store_loaded(
    self: &Arc<Self>,
    key: &K,
    value: V,
    policy_override: Option<ExpirationPolicy>,
    duration_override: Option<Duration>,
  ) -> Arc<V> {
    let mut evicted = Vec::new();
    let result = {
      let mut index = self.index.write();
      if let Some(existing) = index.get(key).cloned() {
        if existing.policy.get() == ExpirationPolicy::Accessed {
          self.reset_entry_locked(&mut index, &existing, false);
        }
        existing.value()
      } else {
        let policy = policy_override.unwrap_or_else(|| self.policy.get());
        let duration_nanos = duration_override
          .map(|d| d.as_nanos() as u64)
          .unwrap_or_else(|| self.duration_nanos.load(Ordering::Acquire));
        let entry =
          self.insert_new_locked(&mut index, key.clone(), value, policy, duration_nanos, &mut evicted);
        entry.value()
      }
    };
    self.notify_evicted(evicted);
    result
  }

  /// Cancels the entry's pending firing, resets its deadline, refiles it,
  /// and re-arms the index head if the entry was the scheduled one (or
  /// unconditionally with `schedule_first`).
  fn reset_entry_locked(
    self: &Arc<Self>,
    index: &mut EntryIndex<K, V>,
    entry: &Arc<ExpiringEntry<K, V>>,
    schedule_first: bool,
  ) {
    let was_scheduled = entry.cancel(true, self.ticker.as_ref());
    index.reorder(entry);
    if was_scheduled || schedule_first {
      if let Some(first) = index.first() {
        self.schedule_entry(&first);
      }
    }
  }

  /// Arms the scheduler for `entry`. A no-op when a firing is already
  /// pending for it.
  fn schedule_entry(self: &Arc<Self>, entry: &Arc<ExpiringEntry<K, V>>) {
    if entry.is_scheduled() {
      return;
    }
    let mut sched = entry.sched.lock();
    if sched.scheduled {
      return;
    }
    sched.generation += 1;
    let generation = sched.generation;
    let delay = Duration::from_nanos(entry.expected_at().saturating_sub(self.ticker.now()));
    let task = self.expiration_task(entry.clone(), generation);
    sched.handle = Some(runtime::scheduler().schedule_after(delay, task));
    sched.scheduled = true;
  }

  /// Builds the job that fires when `entry` comes due: remove it, drain
  /// any other entries whose deadlines have passed, arm the next future
  /// deadline, then notify outside the lock.
  fn expiration_task(self: &Arc<Self>, entry: Arc<ExpiringEntry<K, V>>, generation: u64) -> runtime::Job {
    let shared = Arc::downgrade(self);
    Box::new(move || {
      // The map may have been dropped while the task was queued.
      let Some(shared) = shared.upgrade() else { return };

      let mut expired = Vec::new();
      {
        let mut index = shared.index.write();
        if entry.is_armed(generation) {
          entry.cancel(false, shared.ticker.as_ref());
          index.remove(&entry.key);
          expired.push(entry.clone());
        }

        // One firing sweeps every deadline that has already passed, so a
        // burst of simultaneous expirations wakes the worker only once.
        let now = shared.ticker.now();
        while let Some(head) = index.first() {
          if head.expected_at() <= now {
            head.cancel(false, shared.ticker.as_ref());
            index.remove(&head.key);
            expired.push(head);
          } else {
            shared.schedule_entry(&head);
            break;
          }
        }
      }

      if !expired.is_empty() {
        debug!("swept {} expired entries", expired.len());
        for entry in &expired {
          shared.notify_expired(entry);
        }
      }
    })
  }

  fn notify_expired(&self, entry: &Arc<ExpiringEntry<K, V>>) {
    if self.listeners.is_empty() {
      return;
    }
    let value = entry.value();
    self.listeners.notify(&entry.key, &value);
  }

  fn notify_evicted(&self, evicted: Vec<Arc<ExpiringEntry<K, V>>>) {
    for entry in &evicted {
      self.notify_expired(entry);
    }
  }
}
