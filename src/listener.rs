use crate::runtime;

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

/// Receives a notification for each entry that expires or is evicted.
///
/// Synchronous listeners start out invoked inline on the expiration
/// worker; a listener whose first timed invocation exceeds 100 ms is moved
/// to the shared dispatch pool for all later deliveries. Asynchronous
/// listeners always run on the pool. Panics raised by a listener are
/// swallowed and never reach the worker or the calling thread.
pub trait ExpirationListener<K, V>: Send + Sync {
  fn expired(&self, key: &K, value: &V);
}

impl<K, V, F> ExpirationListener<K, V> for F
where
  F: Fn(&K, &V) + Send + Sync,
{
  fn expired(&self, key: &K, value: &V) {
    self(key, value)
  }
}

/// Identifies a registered listener for later removal. Closures carry no
/// usable identity, so registration hands one out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerHandle(u64);

// Adaptive execution mode of a synchronous listener.
const MODE_UNKNOWN: u8 = 0;
const MODE_INLINE: u8 = 1;
const MODE_OFFLOAD: u8 = 2;

/// Inline invocations slower than this flip the listener to the pool.
const EXECUTION_THRESHOLD: Duration = Duration::from_millis(100);

pub(crate) struct ListenerEntry<K, V> {
  id: u64,
  listener: Arc<dyn ExpirationListener<K, V>>,
  mode: AtomicU8,
}

/// The two listener lists of a map and their dispatch logic.
pub(crate) struct ListenerRegistry<K, V> {
  synchronous: RwLock<Vec<Arc<ListenerEntry<K, V>>>>,
  asynchronous: RwLock<Vec<Arc<ListenerEntry<K, V>>>>,
  next_id: AtomicU64,
}

impl<K, V> ListenerRegistry<K, V> {
  pub(crate) fn new() -> Self {
    Self {
      synchronous: RwLock::new(Vec::new()),
      asynchronous: RwLock::new(Vec::new()),
      next_id: AtomicU64::new(0),
    }
  }

  pub(crate) fn add_sync(&self, listener: Arc<dyn ExpirationListener<K, V>>) -> ListenerHandle {
    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
    self.synchronous.write().push(Arc::new(ListenerEntry {
      id,
      listener,
      mode: AtomicU8::new(MODE_UNKNOWN),
    }));
    ListenerHandle(id)
  }

  pub(crate) fn add_async(&self, listener: Arc<dyn ExpirationListener<K, V>>) -> ListenerHandle {
    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
    self.asynchronous.write().push(Arc::new(ListenerEntry {
      id,
      listener,
      mode: AtomicU8::new(MODE_OFFLOAD),
    }));
    ListenerHandle(id)
  }

  pub(crate) fn remove_sync(&self, handle: ListenerHandle) -> bool {
    let mut listeners = self.synchronous.write();
    let before = listeners.len();
    listeners.retain(|entry| entry.id != handle.0);
    listeners.len() != before
  }

  pub(crate) fn remove_async(&self, handle: ListenerHandle) -> bool {
    let mut listeners = self.asynchronous.write();
    let before = listeners.len();
    listeners.retain(|entry| entry.id != handle.0);
    listeners.len() != before
  }

  /// Delivers one expired entry to every registered listener. Must not be
  /// called while the map's lock is held.
  pub(crate) fn notify(&self, key: &K, value: &Arc<V>)
  where
    K: Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
  {
    let asynchronous = self.asynchronous.read().clone();
    for entry in &asynchronous {
      offload(entry, key, value);
    }

    let synchronous = self.synchronous.read().clone();
    for entry in &synchronous {
      match entry.mode.load(Ordering::Acquire) {
        MODE_INLINE => {
          let _ = panic::catch_unwind(AssertUnwindSafe(|| entry.listener.expired(key, value.as_ref())));
        }
        MODE_OFFLOAD => offload(entry, key, value),
        _ => {
          // First delivery: time the call and lock the mode in.
          let start = Instant::now();
          let _ = panic::catch_unwind(AssertUnwindSafe(|| entry.listener.expired(key, value.as_ref())));
          let mode = if start.elapsed() > EXECUTION_THRESHOLD {
            MODE_OFFLOAD
          } else {
            MODE_INLINE
          };
          entry.mode.store(mode, Ordering::Release);
        }
      }
    }
  }

  pub(crate) fn is_empty(&self) -> bool {
    self.synchronous.read().is_empty() && self.asynchronous.read().is_empty()
  }
}

fn offload<K, V>(entry: &Arc<ListenerEntry<K, V>>, key: &K, value: &Arc<V>)
where
  K: Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  let listener = entry.listener.clone();
  let key = key.clone();
  let value = value.clone();
  runtime::pool().execute(Box::new(move || listener.expired(&key, value.as_ref())));
}
