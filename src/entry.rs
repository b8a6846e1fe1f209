use crate::task::scheduler::TaskHandle;
use crate::time::Ticker;

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Determines when an entry's expiration clock starts counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExpirationPolicy {
  /// Entries expire a fixed duration after they were created or replaced.
  Created = 0,
  /// Entries expire a fixed duration after they were last read.
  Accessed = 1,
}

impl Default for ExpirationPolicy {
  fn default() -> Self {
    ExpirationPolicy::Created
  }
}

/// An atomically updatable [`ExpirationPolicy`] cell. Shared between the map
/// and every entry under uniform expiration; private to each entry under
/// variable expiration.
#[derive(Debug)]
pub(crate) struct PolicyCell(AtomicU8);

impl PolicyCell {
  pub(crate) fn new(policy: ExpirationPolicy) -> Self {
    PolicyCell(AtomicU8::new(policy as u8))
  }

  pub(crate) fn get(&self) -> ExpirationPolicy {
    match self.0.load(Ordering::Acquire) {
      1 => ExpirationPolicy::Accessed,
      _ => ExpirationPolicy::Created,
    }
  }

  pub(crate) fn set(&self, policy: ExpirationPolicy) {
    self.0.store(policy as u8, Ordering::Release);
  }
}

/// Per-entry scheduling state. Guarded by its own mutex so that
/// schedule/cancel races between caller threads and the expiration worker
/// resolve on a single cell.
pub(crate) struct Schedule {
  pub(crate) handle: Option<TaskHandle>,
  pub(crate) scheduled: bool,
  /// Bumped on every arming. A queued expiration task only acts on the
  /// entry when the generation it was armed with is still current.
  pub(crate) generation: u64,
}

static NEXT_ENTRY_ID: AtomicU64 = AtomicU64::new(0);

/// A map entry together with its expiration metadata.
///
/// The value and the deadline fields mutate only while the map's writer
/// lock is held; the atomics exist so readers can observe them without it.
pub(crate) struct ExpiringEntry<K, V> {
  pub(crate) key: K,
  /// Process-unique identity, used to break deadline ties in the
  /// deadline-ordered index.
  pub(crate) id: u64,
  value: Mutex<Arc<V>>,
  pub(crate) policy: Arc<PolicyCell>,
  /// Entry lifetime in nanoseconds.
  pub(crate) duration_nanos: Arc<AtomicU64>,
  /// Absolute deadline in ticker nanoseconds.
  expected_at: AtomicU64,
  /// The deadline the deadline-ordered index currently has this entry filed
  /// under. Maintained by the index, under the map's writer lock.
  pub(crate) indexed_at: AtomicU64,
  pub(crate) sched: Mutex<Schedule>,
}

impl<K, V> ExpiringEntry<K, V> {
  pub(crate) fn new(
    key: K,
    value: V,
    policy: Arc<PolicyCell>,
    duration_nanos: Arc<AtomicU64>,
    ticker: &dyn Ticker,
  ) -> Self {
    let entry = Self {
      key,
      id: NEXT_ENTRY_ID.fetch_add(1, Ordering::Relaxed),
      value: Mutex::new(Arc::new(value)),
      policy,
      duration_nanos,
      expected_at: AtomicU64::new(0),
      indexed_at: AtomicU64::new(0),
      sched: Mutex::new(Schedule { handle: None, scheduled: false, generation: 0 }),
    };
    entry.reset_deadline(ticker);
    entry
  }

  #[inline]
  pub(crate) fn value(&self) -> Arc<V> {
    self.value.lock().clone()
  }

  pub(crate) fn set_value(&self, value: V) {
    *self.value.lock() = Arc::new(value);
  }

  #[inline]
  pub(crate) fn expected_at(&self) -> u64 {
    self.expected_at.load(Ordering::Acquire)
  }

  /// Recomputes the deadline as `now + duration`.
  pub(crate) fn reset_deadline(&self, ticker: &dyn Ticker) {
    let duration = self.duration_nanos.load(Ordering::Acquire);
    self.expected_at.store(ticker.now().saturating_add(duration), Ordering::Release);
  }

  /// Cancels any pending scheduled firing and optionally resets the
  /// deadline. Returns whether a firing was pending. Idempotent.
  pub(crate) fn cancel(&self, reset: bool, ticker: &dyn Ticker) -> bool {
    let was_scheduled = {
      let mut sched = self.sched.lock();
      let was = sched.scheduled;
      // Dropping the handle cancels the pending scheduler job.
      drop(sched.handle.take());
      sched.scheduled = false;
      was
    };
    if reset {
      self.reset_deadline(ticker);
    }
    was_scheduled
  }

  #[inline]
  pub(crate) fn is_scheduled(&self) -> bool {
    self.sched.lock().scheduled
  }

  /// Whether the firing armed with `generation` is still the live one.
  pub(crate) fn is_armed(&self, generation: u64) -> bool {
    let sched = self.sched.lock();
    sched.scheduled && sched.generation == generation
  }
}
