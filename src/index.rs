use crate::entry::ExpiringEntry;

use std::collections::BTreeMap;
use std::hash::Hash;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use ahash::{HashMap, HashMapExt};
use generational_arena::{Arena, Index};

/// The ordered entry index behind a map.
///
/// Both variants satisfy the same contract: key lookup, ordered `first`,
/// and `reorder` after an entry's deadline changed. They differ only in
/// what "ordered" means and in the cost of mutations.
pub(crate) enum EntryIndex<K, V> {
  /// Insertion-ordered, O(1) operations. Used under uniform expiration,
  /// where identical durations make insertion order and deadline order
  /// coincide; `reorder` moves the entry to the tail.
  Insertion(InsertionIndex<K, V>),
  /// Ordered by `(deadline, entry id)`, O(log n) mutations. Used under
  /// variable expiration.
  Deadline(DeadlineIndex<K, V>),
}

impl<K: Eq + Hash + Clone, V> EntryIndex<K, V> {
  pub(crate) fn new(variable: bool) -> Self {
    if variable {
      EntryIndex::Deadline(DeadlineIndex::new())
    } else {
      EntryIndex::Insertion(InsertionIndex::new())
    }
  }

  pub(crate) fn get(&self, key: &K) -> Option<&Arc<ExpiringEntry<K, V>>> {
    match self {
      EntryIndex::Insertion(index) => index.get(key),
      EntryIndex::Deadline(index) => index.lookup.get(key),
    }
  }

  pub(crate) fn contains_key(&self, key: &K) -> bool {
    match self {
      EntryIndex::Insertion(index) => index.lookup.contains_key(key),
      EntryIndex::Deadline(index) => index.lookup.contains_key(key),
    }
  }

  /// Files a new entry. The caller guarantees the key is absent.
  pub(crate) fn insert(&mut self, entry: Arc<ExpiringEntry<K, V>>) {
    match self {
      EntryIndex::Insertion(index) => index.insert(entry),
      EntryIndex::Deadline(index) => index.insert(entry),
    }
  }

  pub(crate) fn remove(&mut self, key: &K) -> Option<Arc<ExpiringEntry<K, V>>> {
    match self {
      EntryIndex::Insertion(index) => index.remove(key),
      EntryIndex::Deadline(index) => index.remove(key),
    }
  }

  /// The entry due to expire next, if any.
  pub(crate) fn first(&self) -> Option<Arc<ExpiringEntry<K, V>>> {
    match self {
      EntryIndex::Insertion(index) => index.first(),
      EntryIndex::Deadline(index) => index.first(),
    }
  }

  /// Refiles an entry after its deadline changed.
  pub(crate) fn reorder(&mut self, entry: &Arc<ExpiringEntry<K, V>>) {
    match self {
      EntryIndex::Insertion(index) => index.move_to_tail(entry),
      EntryIndex::Deadline(index) => index.refile(entry),
    }
  }

  pub(crate) fn len(&self) -> usize {
    match self {
      EntryIndex::Insertion(index) => index.lookup.len(),
      EntryIndex::Deadline(index) => index.lookup.len(),
    }
  }

  pub(crate) fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub(crate) fn clear(&mut self) {
    match self {
      EntryIndex::Insertion(index) => index.clear(),
      EntryIndex::Deadline(index) => {
        index.lookup.clear();
        index.by_deadline.clear();
      }
    }
  }

  /// An ordered snapshot of the entries, soonest-expiring first.
  pub(crate) fn entries_in_order(&self) -> Vec<Arc<ExpiringEntry<K, V>>> {
    match self {
      EntryIndex::Insertion(index) => index.entries_in_order(),
      EntryIndex::Deadline(index) => index.by_deadline.values().cloned().collect(),
    }
  }
}

// ---------------------------------------------------------------------------
// Insertion-ordered variant
// ---------------------------------------------------------------------------

struct Node<K, V> {
  entry: Arc<ExpiringEntry<K, V>>,
  prev: Option<Index>,
  next: Option<Index>,
}

/// A doubly linked list over arena nodes plus a key lookup map.
/// Head is the oldest entry, tail the newest.
pub(crate) struct InsertionIndex<K, V> {
  nodes: Arena<Node<K, V>>,
  lookup: HashMap<K, Index>,
  head: Option<Index>,
  tail: Option<Index>,
}

impl<K: Eq + Hash + Clone, V> InsertionIndex<K, V> {
  fn new() -> Self {
    Self {
      nodes: Arena::new(),
      lookup: HashMap::new(),
      head: None,
      tail: None,
    }
  }

  fn get(&self, key: &K) -> Option<&Arc<ExpiringEntry<K, V>>> {
    self.lookup.get(key).map(|&index| &self.nodes[index].entry)
  }

  fn unlink(&mut self, index: Index) {
    let node = &self.nodes[index];
    let prev_idx = node.prev;
    let next_idx = node.next;

    if let Some(prev) = prev_idx {
      self.nodes[prev].next = next_idx;
    } else {
      self.head = next_idx;
    }

    if let Some(next) = next_idx {
      self.nodes[next].prev = prev_idx;
    } else {
      self.tail = prev_idx;
    }
  }

  fn link_at_tail(&mut self, index: Index) {
    let old_tail = self.tail;
    self.nodes[index].prev = old_tail;
    self.nodes[index].next = None;
    self.tail = Some(index);

    if let Some(old) = old_tail {
      self.nodes[old].next = Some(index);
    }
    if self.head.is_none() {
      self.head = Some(index);
    }
  }

  fn insert(&mut self, entry: Arc<ExpiringEntry<K, V>>) {
    let key = entry.key.clone();
    if let Some(index) = self.lookup.remove(&key) {
      self.unlink(index);
      self.nodes.remove(index);
    }
    let index = self.nodes.insert(Node { entry, prev: None, next: None });
    self.lookup.insert(key, index);
    self.link_at_tail(index);
  }

  fn remove(&mut self, key: &K) -> Option<Arc<ExpiringEntry<K, V>>> {
    let index = self.lookup.remove(key)?;
    self.unlink(index);
    self.nodes.remove(index).map(|node| node.entry)
  }

  fn first(&self) -> Option<Arc<ExpiringEntry<K, V>>> {
    self.head.map(|index| self.nodes[index].entry.clone())
  }

  fn move_to_tail(&mut self, entry: &Arc<ExpiringEntry<K, V>>) {
    if let Some(&index) = self.lookup.get(&entry.key) {
      if self.tail != Some(index) {
        self.unlink(index);
        self.link_at_tail(index);
      }
    }
  }

  fn clear(&mut self) {
    self.nodes.clear();
    self.lookup.clear();
    self.head = None;
    self.tail = None;
  }

  fn entries_in_order(&self) -> Vec<Arc<ExpiringEntry<K, V>>> {
    let mut entries = Vec::with_capacity(self.lookup.len());
    let mut current = self.head;
    while let Some(index) = current {
      entries.push(self.nodes[index].entry.clone());
      current = self.nodes[index].next;
    }
    entries
  }
}

// ---------------------------------------------------------------------------
// Deadline-ordered variant
// ---------------------------------------------------------------------------

/// Key lookup map plus a deadline-sorted tree. The sort key pairs the
/// deadline with the entry's unique id so that entries with equal deadlines
/// never collide; the entry records the deadline it was filed under
/// (`indexed_at`) so it can be refiled after a reset.
pub(crate) struct DeadlineIndex<K, V> {
  lookup: HashMap<K, Arc<ExpiringEntry<K, V>>>,
  by_deadline: BTreeMap<(u64, u64), Arc<ExpiringEntry<K, V>>>,
}

impl<K: Eq + Hash + Clone, V> DeadlineIndex<K, V> {
  fn new() -> Self {
    Self {
      lookup: HashMap::new(),
      by_deadline: BTreeMap::new(),
    }
  }

  fn insert(&mut self, entry: Arc<ExpiringEntry<K, V>>) {
    let deadline = entry.expected_at();
    entry.indexed_at.store(deadline, Ordering::Release);
    self.by_deadline.insert((deadline, entry.id), entry.clone());
    if let Some(previous) = self.lookup.insert(entry.key.clone(), entry) {
      let stale = (previous.indexed_at.load(Ordering::Acquire), previous.id);
      self.by_deadline.remove(&stale);
    }
  }

  fn remove(&mut self, key: &K) -> Option<Arc<ExpiringEntry<K, V>>> {
    let entry = self.lookup.remove(key)?;
    self.by_deadline.remove(&(entry.indexed_at.load(Ordering::Acquire), entry.id));
    Some(entry)
  }

  fn first(&self) -> Option<Arc<ExpiringEntry<K, V>>> {
    self.by_deadline.first_key_value().map(|(_, entry)| entry.clone())
  }

  fn refile(&mut self, entry: &Arc<ExpiringEntry<K, V>>) {
    let old = entry.indexed_at.load(Ordering::Acquire);
    if self.by_deadline.remove(&(old, entry.id)).is_some() {
      let deadline = entry.expected_at();
      entry.indexed_at.store(deadline, Ordering::Release);
      self.by_deadline.insert((deadline, entry.id), entry.clone());
    }
  }
}
