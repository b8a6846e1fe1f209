mod common;

use common::wait_until;
use expiremap::{ExpirationListener, ExpiringMap};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, Sender};

const SHORT_TTL: Duration = Duration::from_millis(100);
const WAIT: Duration = Duration::from_secs(10);

/// Forwards every notification, tagged with the delivering thread's name.
struct RecordingListener {
  events: Sender<(String, u32, String)>,
  delay: Duration,
}

impl ExpirationListener<String, u32> for RecordingListener {
  fn expired(&self, key: &String, value: &u32) {
    let thread_name = thread::current().name().unwrap_or("").to_string();
    thread::sleep(self.delay);
    let _ = self.events.send((key.clone(), *value, thread_name));
  }
}

#[test]
fn every_listener_fires_once_per_entry() {
  let (sync_tx, sync_rx) = unbounded();
  let (async_tx, async_rx) = unbounded();
  let map: ExpiringMap<String, u32> = ExpiringMap::builder()
    .expiration(SHORT_TTL)
    .expiration_listener(RecordingListener { events: sync_tx, delay: Duration::ZERO })
    .async_expiration_listener(RecordingListener { events: async_tx, delay: Duration::ZERO })
    .build()
    .unwrap();

  map.put("x".to_string(), 1);
  map.put("y".to_string(), 2);

  for rx in [&sync_rx, &async_rx] {
    let mut events: Vec<(String, u32)> = (0..2)
      .map(|_| rx.recv_timeout(WAIT).expect("expiration event"))
      .map(|(key, value, _)| (key, value))
      .collect();
    events.sort();
    assert_eq!(events, vec![("x".to_string(), 1), ("y".to_string(), 2)]);
    assert!(
      rx.recv_timeout(Duration::from_millis(300)).is_err(),
      "exactly one invocation per listener per entry"
    );
  }
}

#[test]
fn slow_sync_listeners_move_to_the_pool() {
  let (tx, rx) = unbounded();
  let map: ExpiringMap<String, u32> = ExpiringMap::builder()
    .expiration(SHORT_TTL)
    .expiration_listener(RecordingListener { events: tx, delay: Duration::from_millis(150) })
    .build()
    .unwrap();

  map.put("first".to_string(), 1);
  let (_, _, first_thread) = rx.recv_timeout(WAIT).expect("first event");
  assert_eq!(first_thread, "expiremap-expirer", "first delivery is timed inline");

  // The 150 ms invocation exceeded the 100 ms threshold, so the listener
  // is now pooled.
  map.put("second".to_string(), 2);
  let (_, _, second_thread) = rx.recv_timeout(WAIT).expect("second event");
  assert!(
    second_thread.starts_with("expiremap-listener-"),
    "slow listener was offloaded, got thread {second_thread:?}"
  );
}

#[test]
fn fast_sync_listeners_stay_inline() {
  let (tx, rx) = unbounded();
  let map: ExpiringMap<String, u32> = ExpiringMap::builder()
    .expiration(SHORT_TTL)
    .expiration_listener(RecordingListener { events: tx, delay: Duration::ZERO })
    .build()
    .unwrap();

  map.put("first".to_string(), 1);
  rx.recv_timeout(WAIT).expect("first event");

  map.put("second".to_string(), 2);
  let (_, _, second_thread) = rx.recv_timeout(WAIT).expect("second event");
  assert_eq!(second_thread, "expiremap-expirer", "fast listener keeps inline delivery");
}

#[test]
fn async_listeners_always_run_on_the_pool() {
  let (tx, rx) = unbounded();
  let map: ExpiringMap<String, u32> = ExpiringMap::builder()
    .expiration(SHORT_TTL)
    .async_expiration_listener(RecordingListener { events: tx, delay: Duration::ZERO })
    .build()
    .unwrap();

  map.put("k".to_string(), 1);
  let (_, _, thread_name) = rx.recv_timeout(WAIT).expect("async event");
  assert!(
    thread_name.starts_with("expiremap-listener-"),
    "async delivery happens on the pool, got thread {thread_name:?}"
  );
}

#[test]
fn panicking_listener_does_not_halt_expiration() {
  let (tx, rx) = unbounded();
  let map: ExpiringMap<String, u32> = ExpiringMap::builder()
    .expiration(SHORT_TTL)
    .expiration_listener(|_: &String, _: &u32| panic!("listener misbehaved"))
    .expiration_listener(RecordingListener { events: tx, delay: Duration::ZERO })
    .build()
    .unwrap();

  map.put("x".to_string(), 1);
  map.put("y".to_string(), 2);

  for _ in 0..2 {
    rx.recv_timeout(WAIT).expect("expiration despite a panicking peer");
  }
  wait_until(WAIT, || map.is_empty());
}

#[test]
fn removed_listeners_stop_receiving() {
  let expirations = Arc::new(AtomicUsize::new(0));
  let map: ExpiringMap<String, u32> =
    ExpiringMap::builder().expiration(SHORT_TTL).build().unwrap();

  let counter = expirations.clone();
  let handle = map.add_expiration_listener(move |_: &String, _: &u32| {
    counter.fetch_add(1, Ordering::SeqCst);
  });

  assert!(map.remove_expiration_listener(handle));
  assert!(!map.remove_expiration_listener(handle), "handle is gone after removal");

  map.put("k".to_string(), 1);
  wait_until(WAIT, || map.is_empty());
  thread::sleep(Duration::from_millis(200));
  assert_eq!(expirations.load(Ordering::SeqCst), 0);
}

#[test]
fn listeners_can_be_added_at_runtime() {
  let (tx, rx) = unbounded();
  let map: ExpiringMap<String, u32> =
    ExpiringMap::builder().expiration(SHORT_TTL).build().unwrap();

  map.add_async_expiration_listener(RecordingListener { events: tx, delay: Duration::ZERO });
  map.put("k".to_string(), 9);

  let (key, value, _) = rx.recv_timeout(WAIT).expect("event from runtime-added listener");
  assert_eq!((key, value), ("k".to_string(), 9));
}
