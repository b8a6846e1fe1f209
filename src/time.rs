use once_cell::sync::Lazy;
use std::time::Instant;

// The single, static reference point for all deadline calculations.
// Initialized lazily on first use.
static EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// A monotonic time source.
///
/// Returns nanoseconds elapsed since some arbitrary, fixed point in time.
/// Deadlines are computed and compared exclusively through a `Ticker`; the
/// map never reads wall-clock time. Tests may substitute a value-holding
/// implementation via [`ExpiringMapBuilder::ticker`](crate::ExpiringMapBuilder::ticker).
pub trait Ticker: Send + Sync {
  fn now(&self) -> u64;
}

/// The default ticker, measuring from a process-wide epoch captured on
/// first use.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTicker;

impl Ticker for SystemTicker {
  #[inline]
  fn now(&self) -> u64 {
    EPOCH.elapsed().as_nanos() as u64
  }
}
