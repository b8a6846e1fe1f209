#![allow(dead_code)]

use expiremap::Ticker;

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Modifiable test ticker. Values are set in milliseconds and reported as
/// nanoseconds; time starts at zero and only moves when told to.
#[derive(Debug, Default)]
pub struct TestTicker(AtomicU64);

impl TestTicker {
  pub fn new() -> Self {
    TestTicker(AtomicU64::new(0))
  }

  pub fn set_millis(&self, millis: u64) {
    self.0.store(millis * 1_000_000, Ordering::SeqCst);
  }

  pub fn advance_millis(&self, millis: u64) {
    self.0.fetch_add(millis * 1_000_000, Ordering::SeqCst);
  }
}

impl Ticker for TestTicker {
  fn now(&self) -> u64 {
    self.0.load(Ordering::SeqCst)
  }
}

/// Polls until `condition` holds, panicking after `timeout`.
pub fn wait_until<F: Fn() -> bool>(timeout: Duration, condition: F) {
  let deadline = Instant::now() + timeout;
  while !condition() {
    assert!(Instant::now() < deadline, "condition not met within {timeout:?}");
    thread::sleep(Duration::from_millis(5));
  }
}
