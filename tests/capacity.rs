mod common;

use expiremap::{BuildError, ExpirationPolicy, ExpiringMap};

use std::time::Duration;

use crossbeam_channel::unbounded;

const LONG_TTL: Duration = Duration::from_secs(3600);
const WAIT: Duration = Duration::from_secs(10);

#[test]
fn over_cap_insertion_evicts_the_oldest() {
  let (tx, rx) = unbounded();
  let map: ExpiringMap<String, u32> = ExpiringMap::builder()
    .expiration(LONG_TTL)
    .max_size(2)
    .expiration_listener(move |key: &String, value: &u32| {
      let _ = tx.send((key.clone(), *value));
    })
    .build()
    .unwrap();

  map.put("a".to_string(), 1);
  map.put("b".to_string(), 1);
  map.put("c".to_string(), 1);

  assert_eq!(map.len(), 2);
  assert!(!map.contains_key(&"a".to_string()), "the oldest entry was evicted");
  assert!(map.contains_key(&"b".to_string()));
  assert!(map.contains_key(&"c".to_string()));

  let event = rx.recv_timeout(WAIT).expect("eviction event");
  assert_eq!(event, ("a".to_string(), 1));
  assert!(rx.recv_timeout(Duration::from_millis(200)).is_err(), "only one entry was evicted");
}

#[test]
fn size_never_exceeds_the_cap() {
  let map: ExpiringMap<String, usize> =
    ExpiringMap::builder().expiration(LONG_TTL).max_size(3).build().unwrap();

  let keys = ["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"];
  for (n, key) in keys.iter().enumerate() {
    map.put(key.to_string(), n);
    assert!(map.len() <= 3, "cap exceeded after inserting {key}");
  }

  let survivors: Vec<String> = map.keys().collect::<Result<_, _>>().unwrap();
  assert_eq!(survivors, vec!["h", "i", "j"], "the newest entries survive");
}

#[test]
fn variable_maps_evict_the_soonest_deadline() {
  let map: ExpiringMap<String, u32> = ExpiringMap::builder()
    .variable_expiration()
    .max_size(2)
    .build()
    .unwrap();

  map.put_with("a".to_string(), 1, ExpirationPolicy::Created, LONG_TTL).unwrap();
  map.put_with("b".to_string(), 2, ExpirationPolicy::Created, Duration::from_secs(60)).unwrap();
  map.put_with("c".to_string(), 3, ExpirationPolicy::Created, LONG_TTL).unwrap();

  assert!(!map.contains_key(&"b".to_string()), "the head of the deadline order is evicted");
  assert!(map.contains_key(&"a".to_string()));
  assert!(map.contains_key(&"c".to_string()));
}

#[test]
fn replacing_a_value_does_not_evict() {
  let map: ExpiringMap<String, u32> =
    ExpiringMap::builder().expiration(LONG_TTL).max_size(2).build().unwrap();

  map.put("a".to_string(), 1);
  map.put("b".to_string(), 2);
  map.put("a".to_string(), 3);

  assert_eq!(map.len(), 2);
  assert_eq!(map.get(&"a".to_string()).as_deref(), Some(&3));
  assert!(map.contains_key(&"b".to_string()));
}

#[test]
fn zero_max_size_is_rejected() {
  let result = ExpiringMap::<String, u32>::builder().max_size(0).build();
  assert_eq!(result.err(), Some(BuildError::ZeroMaxSize));
}
