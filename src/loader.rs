use crate::entry::ExpirationPolicy;

use std::sync::Arc;
use std::time::Duration;

/// A value produced by an expiring entry loader, optionally carrying its
/// own expiration policy and duration. Absent fields fall back to the
/// map's defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiringValue<V> {
  value: V,
  policy: Option<ExpirationPolicy>,
  duration: Option<Duration>,
}

impl<V> ExpiringValue<V> {
  /// A value expiring under the map's default policy and duration.
  pub fn new(value: V) -> Self {
    Self { value, policy: None, duration: None }
  }

  /// Overrides the expiration policy for this value.
  pub fn with_policy(mut self, policy: ExpirationPolicy) -> Self {
    self.policy = Some(policy);
    self
  }

  /// Overrides the expiration duration for this value.
  pub fn with_duration(mut self, duration: Duration) -> Self {
    self.duration = Some(duration);
    self
  }

  pub fn value(&self) -> &V {
    &self.value
  }

  pub fn policy(&self) -> Option<ExpirationPolicy> {
    self.policy
  }

  pub fn duration(&self) -> Option<Duration> {
    self.duration
  }

  pub(crate) fn into_parts(self) -> (V, Option<ExpirationPolicy>, Option<Duration>) {
    (self.value, self.policy, self.duration)
  }
}

/// The loading strategy invoked by `get` on a miss.
pub(crate) enum Loader<K, V> {
  /// Returns a value stored under the map's defaults.
  Plain(Arc<dyn Fn(&K) -> V + Send + Sync>),
  /// Returns a value with optional per-value expiration overrides, or
  /// `None` to store nothing.
  Expiring(Arc<dyn Fn(&K) -> Option<ExpiringValue<V>> + Send + Sync>),
}

impl<K, V> Clone for Loader<K, V> {
  fn clone(&self) -> Self {
    match self {
      Loader::Plain(f) => Loader::Plain(f.clone()),
      Loader::Expiring(f) => Loader::Expiring(f.clone()),
    }
  }
}
