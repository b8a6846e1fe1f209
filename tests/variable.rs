mod common;

use common::{wait_until, TestTicker};
use expiremap::{Error, ExpirationPolicy, ExpiringMap};

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::unbounded;

const WAIT: Duration = Duration::from_secs(10);
/// Seconds-scale default for fake-ticker tests, so the real-time worker
/// never sweeps mid-assertion.
const TICK_TTL: Duration = Duration::from_secs(100);

fn variable_map_with_ticker(ticker: Arc<TestTicker>) -> ExpiringMap<String, u32> {
  ExpiringMap::builder()
    .expiration(TICK_TTL)
    .variable_expiration()
    .ticker(ticker)
    .build()
    .unwrap()
}

#[test]
fn per_entry_durations_expire_independently() {
  let (tx, rx) = unbounded();
  let map: ExpiringMap<String, String> = ExpiringMap::builder()
    .variable_expiration()
    .expiration_listener(move |key: &String, value: &String| {
      let _ = tx.send((key.clone(), value.clone()));
    })
    .build()
    .unwrap();

  map
    .put_with("a".to_string(), "1".to_string(), ExpirationPolicy::Created, Duration::from_millis(150))
    .unwrap();
  map
    .put_with("b".to_string(), "2".to_string(), ExpirationPolicy::Created, Duration::from_millis(450))
    .unwrap();

  let first = rx.recv_timeout(WAIT).expect("first expiration");
  assert_eq!(first, ("a".to_string(), "1".to_string()));
  assert!(map.contains_key(&"b".to_string()), "the longer-lived entry survives the first sweep");

  let second = rx.recv_timeout(WAIT).expect("second expiration");
  assert_eq!(second, ("b".to_string(), "2".to_string()));
  wait_until(WAIT, || map.is_empty());
}

#[test]
fn index_iterates_in_deadline_order() {
  let ticker = Arc::new(TestTicker::new());
  let map = variable_map_with_ticker(ticker);

  map.put_with("a".to_string(), 1, ExpirationPolicy::Created, Duration::from_secs(100)).unwrap();
  map.put_with("b".to_string(), 2, ExpirationPolicy::Created, Duration::from_secs(200)).unwrap();
  map.put_with("c".to_string(), 3, ExpirationPolicy::Created, Duration::from_secs(50)).unwrap();

  let keys: Vec<String> = map.keys().collect::<Result<_, _>>().unwrap();
  assert_eq!(keys, vec!["c", "a", "b"]);
}

#[test]
fn set_expiration_of_reorders_entries() {
  let ticker = Arc::new(TestTicker::new());
  let map = variable_map_with_ticker(ticker);

  map.put_with("a".to_string(), 1, ExpirationPolicy::Created, Duration::from_secs(100)).unwrap();
  map.put_with("b".to_string(), 2, ExpirationPolicy::Created, Duration::from_secs(200)).unwrap();

  map.set_expiration_of(&"a".to_string(), Duration::from_secs(500)).unwrap();

  let keys: Vec<String> = map.keys().collect::<Result<_, _>>().unwrap();
  assert_eq!(keys, vec!["b", "a"]);
  assert_eq!(map.expected_expiration(&"a".to_string()), Ok(Duration::from_secs(500)));

  assert_eq!(
    map.set_expiration_of(&"missing".to_string(), Duration::from_secs(10)),
    Err(Error::KeyNotFound)
  );
}

#[test]
fn per_entry_policy_updates() {
  let ticker = Arc::new(TestTicker::new());
  let map = variable_map_with_ticker(ticker);

  map.put_with("a".to_string(), 1, ExpirationPolicy::Created, Duration::from_secs(100)).unwrap();
  assert_eq!(map.expiration_policy_of(&"a".to_string()), Ok(ExpirationPolicy::Created));

  map.set_expiration_policy_of(&"a".to_string(), ExpirationPolicy::Accessed).unwrap();
  assert_eq!(map.expiration_policy_of(&"a".to_string()), Ok(ExpirationPolicy::Accessed));

  assert_eq!(
    map.set_expiration_policy_of(&"missing".to_string(), ExpirationPolicy::Accessed),
    Err(Error::KeyNotFound)
  );
}

#[test]
fn variable_only_operations_fail_on_uniform_maps() {
  let map: ExpiringMap<String, u32> =
    ExpiringMap::builder().expiration(Duration::from_secs(3600)).build().unwrap();
  map.put("a".to_string(), 1);

  assert_eq!(
    map.put_with("b".to_string(), 2, ExpirationPolicy::Created, Duration::from_secs(1)),
    Err(Error::VariableExpirationDisabled)
  );
  assert_eq!(
    map.set_expiration_of(&"a".to_string(), Duration::from_secs(1)),
    Err(Error::VariableExpirationDisabled)
  );
  assert_eq!(
    map.set_expiration_policy_of(&"a".to_string(), ExpirationPolicy::Accessed),
    Err(Error::VariableExpirationDisabled)
  );
  assert_eq!(map.set_expiration(Duration::from_secs(1)), Err(Error::VariableExpirationDisabled));
}

#[test]
fn map_level_policy_is_shared_with_uniform_entries() {
  let ticker = Arc::new(TestTicker::new());
  let map: ExpiringMap<String, u32> = ExpiringMap::builder()
    .expiration(Duration::from_secs(3600))
    .ticker(ticker)
    .build()
    .unwrap();

  map.put("a".to_string(), 1);
  assert_eq!(map.expiration_policy_of(&"a".to_string()), Ok(ExpirationPolicy::Created));

  map.set_expiration_policy(ExpirationPolicy::Accessed);
  assert_eq!(
    map.expiration_policy_of(&"a".to_string()),
    Ok(ExpirationPolicy::Accessed),
    "uniform entries share the map's policy cell"
  );
}

#[test]
fn map_default_duration_applies_to_new_entries_only() {
  let ticker = Arc::new(TestTicker::new());
  let map = variable_map_with_ticker(ticker);

  map.put("old".to_string(), 1);
  map.set_expiration(Duration::from_secs(250)).unwrap();
  map.put("new".to_string(), 2);

  assert_eq!(map.expected_expiration(&"old".to_string()), Ok(TICK_TTL));
  assert_eq!(map.expected_expiration(&"new".to_string()), Ok(Duration::from_secs(250)));
}

#[test]
fn equal_value_put_with_keeps_the_deadline() {
  let ticker = Arc::new(TestTicker::new());
  let map = variable_map_with_ticker(ticker.clone());

  map.put_with("k".to_string(), 1, ExpirationPolicy::Created, Duration::from_secs(100)).unwrap();
  ticker.set_millis(40_000);
  map.put_with("k".to_string(), 1, ExpirationPolicy::Created, Duration::from_secs(900)).unwrap();

  assert_eq!(
    map.expected_expiration(&"k".to_string()),
    Ok(Duration::from_secs(60)),
    "an equal value under CREATED leaves the entry untouched"
  );
}

#[test]
fn put_with_update_adopts_new_settings() {
  let ticker = Arc::new(TestTicker::new());
  let map = variable_map_with_ticker(ticker.clone());

  map.put_with("k".to_string(), 1, ExpirationPolicy::Created, Duration::from_secs(100)).unwrap();
  ticker.set_millis(40_000);
  map.put_with("k".to_string(), 2, ExpirationPolicy::Accessed, Duration::from_secs(300)).unwrap();

  assert_eq!(map.expected_expiration(&"k".to_string()), Ok(Duration::from_secs(300)));
  assert_eq!(map.expiration_of(&"k".to_string()), Ok(Duration::from_secs(300)));
  assert_eq!(map.expiration_policy_of(&"k".to_string()), Ok(ExpirationPolicy::Accessed));
}
