use crate::entry::{ExpirationPolicy, PolicyCell};
use crate::error::BuildError;
use crate::index::EntryIndex;
use crate::listener::{ExpirationListener, ListenerRegistry};
use crate::loader::{ExpiringValue, Loader};
use crate::map::ExpiringMap;
use crate::shared::MapShared;
use crate::time::{SystemTicker, Ticker};

use std::hash::Hash;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

/// A builder for [`ExpiringMap`] instances.
///
/// Defaults to uniform expiration of 60 seconds under policy
/// [`ExpirationPolicy::Created`], with no size cap, loader, or listeners.
pub struct ExpiringMapBuilder<K, V> {
  duration: Duration,
  policy: ExpirationPolicy,
  variable: bool,
  max_size: Option<usize>,
  plain_loader: Option<Arc<dyn Fn(&K) -> V + Send + Sync>>,
  expiring_loader: Option<Arc<dyn Fn(&K) -> Option<ExpiringValue<V>> + Send + Sync>>,
  listeners: Vec<Arc<dyn ExpirationListener<K, V>>>,
  async_listeners: Vec<Arc<dyn ExpirationListener<K, V>>>,
  ticker: Option<Arc<dyn Ticker>>,
}

impl<K, V> ExpiringMapBuilder<K, V> {
  pub fn new() -> Self {
    Self {
      duration: Duration::from_secs(60),
      policy: ExpirationPolicy::Created,
      variable: false,
      max_size: None,
      plain_loader: None,
      expiring_loader: None,
      listeners: Vec::new(),
      async_listeners: Vec::new(),
      ticker: None,
    }
  }

  /// Sets the default entry lifetime.
  pub fn expiration(mut self, duration: Duration) -> Self {
    self.duration = duration;
    self
  }

  /// Sets the default expiration policy.
  pub fn expiration_policy(mut self, policy: ExpirationPolicy) -> Self {
    self.policy = policy;
    self
  }

  /// Enables per-entry expiration policies and durations. Switches the
  /// internal index from insertion order to deadline order, making
  /// mutations O(log n) instead of O(1).
  pub fn variable_expiration(mut self) -> Self {
    self.variable = true;
    self
  }

  /// Caps the number of live entries. An insertion over the cap evicts
  /// the entry closest to expiring, which is delivered to listeners like
  /// a timed expiration.
  pub fn max_size(mut self, max_size: usize) -> Self {
    self.max_size = Some(max_size);
    self
  }

  /// Sets the loader invoked by `get` on a miss. The result is stored
  /// under the map's defaults. Mutually exclusive with
  /// [`expiring_entry_loader`](Self::expiring_entry_loader).
  pub fn entry_loader<F>(mut self, loader: F) -> Self
  where
    F: Fn(&K) -> V + Send + Sync + 'static,
  {
    self.plain_loader = Some(Arc::new(loader));
    self
  }

  /// Sets a loader whose results carry optional per-value expiration
  /// overrides; a `None` result stores nothing. Requires
  /// [`variable_expiration`](Self::variable_expiration) and is mutually
  /// exclusive with [`entry_loader`](Self::entry_loader).
  pub fn expiring_entry_loader<F>(mut self, loader: F) -> Self
  where
    F: Fn(&K) -> Option<ExpiringValue<V>> + Send + Sync + 'static,
  {
    self.expiring_loader = Some(Arc::new(loader));
    self
  }

  /// Registers a synchronous (adaptive) expiration listener.
  pub fn expiration_listener<L>(mut self, listener: L) -> Self
  where
    L: ExpirationListener<K, V> + 'static,
  {
    self.listeners.push(Arc::new(listener));
    self
  }

  /// Registers an asynchronous expiration listener.
  pub fn async_expiration_listener<L>(mut self, listener: L) -> Self
  where
    L: ExpirationListener<K, V> + 'static,
  {
    self.async_listeners.push(Arc::new(listener));
    self
  }

  /// Replaces the time source. Intended for tests.
  pub fn ticker(mut self, ticker: Arc<dyn Ticker>) -> Self {
    self.ticker = Some(ticker);
    self
  }
}

impl<K, V> ExpiringMapBuilder<K, V>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  /// Builds the map.
  pub fn build(self) -> Result<ExpiringMap<K, V>, BuildError> {
    self.validate()?;
    Ok(self.build_map())
  }

  fn validate(&self) -> Result<(), BuildError> {
    if self.plain_loader.is_some() && self.expiring_loader.is_some() {
      return Err(BuildError::ConflictingLoaders);
    }
    if self.expiring_loader.is_some() && !self.variable {
      return Err(BuildError::LoaderRequiresVariableExpiration);
    }
    if self.max_size == Some(0) {
      return Err(BuildError::ZeroMaxSize);
    }
    Ok(())
  }

  pub(crate) fn build_map(self) -> ExpiringMap<K, V> {
    let loader = match (self.plain_loader, self.expiring_loader) {
      (Some(load), _) => Some(Loader::Plain(load)),
      (None, Some(load)) => Some(Loader::Expiring(load)),
      (None, None) => None,
    };

    let listeners = ListenerRegistry::new();
    for listener in self.listeners {
      listeners.add_sync(listener);
    }
    for listener in self.async_listeners {
      listeners.add_async(listener);
    }

    let shared = Arc::new(MapShared {
      index: RwLock::new(EntryIndex::new(self.variable)),
      policy: Arc::new(PolicyCell::new(self.policy)),
      duration_nanos: Arc::new(AtomicU64::new(self.duration.as_nanos() as u64)),
      variable: self.variable,
      max_size: self.max_size,
      loader,
      listeners,
      ticker: self.ticker.unwrap_or_else(|| Arc::new(SystemTicker)),
    });
    ExpiringMap::from_shared(shared)
  }
}

impl<K, V> Default for ExpiringMapBuilder<K, V> {
  fn default() -> Self {
    Self::new()
  }
}
