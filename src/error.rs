use std::fmt;

/// Errors that can occur when building a map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
  /// Both a plain entry loader and an expiring entry loader were configured.
  /// A map can only have one loading strategy.
  ConflictingLoaders,
  /// An expiring entry loader was configured on a map without variable
  /// expiration. Per-value duration and policy overrides require it.
  LoaderRequiresVariableExpiration,
  /// The map was configured with a maximum size of zero, which would evict
  /// every entry on insertion.
  ZeroMaxSize,
}

impl fmt::Display for BuildError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      BuildError::ConflictingLoaders => {
        write!(f, "a map cannot have both an entry loader and an expiring entry loader")
      }
      BuildError::LoaderRequiresVariableExpiration => {
        write!(f, "an expiring entry loader requires variable expiration")
      }
      BuildError::ZeroMaxSize => write!(f, "maximum size cannot be zero"),
    }
  }
}

impl std::error::Error for BuildError {}

/// Errors surfaced by map operations at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
  /// A per-entry expiration operation was invoked on a map that was not
  /// built with [`variable_expiration`](crate::ExpiringMapBuilder::variable_expiration).
  VariableExpirationDisabled,
  /// The key has no entry in the map.
  KeyNotFound,
  /// The map was modified (by another thread or by a timed expiration)
  /// while an iterator was being advanced.
  ConcurrentModification,
  /// The process-wide thread factory can no longer be replaced because the
  /// background runtime has already started.
  RuntimeInitialized,
}

impl fmt::Display for Error {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Error::VariableExpirationDisabled => write!(f, "variable expiration is not enabled"),
      Error::KeyNotFound => write!(f, "no entry exists for the given key"),
      Error::ConcurrentModification => write!(f, "map was modified during iteration"),
      Error::RuntimeInitialized => {
        write!(f, "thread factory must be set before the background runtime starts")
      }
    }
  }
}

impl std::error::Error for Error {}
