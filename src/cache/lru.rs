//! LRU Tracker Module
//!
//! Capacity-bound recency store: a key index plus an arena-backed doubly-linked
//! list ordering entries from most to least recently used. Lookup, insertion,
//! promotion and removal are all O(1).

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

use crate::cache::CacheEntry;

/// Null link in the arena list.
const NIL: usize = usize::MAX;

/// An entry detached from the tracker, with the arena slot it occupied.
pub type Detached<K, V> = (usize, CacheEntry<K, V>);

#[derive(Debug)]
struct Node<K, V> {
    /// None while the slot sits on the free list
    entry: Option<CacheEntry<K, V>>,
    prev: usize,
    next: usize,
}

// == LRU Tracker ==
/// Owns cache entries and their access order.
///
/// - Head = Most recently used
/// - Tail = Least recently used
///
/// Slots are stable for the lifetime of an entry, so other structures (the
/// expiration wheel) can refer to an entry by slot. A slot is recycled only
/// after its entry has been detached.
#[derive(Debug)]
pub struct LruTracker<K, V> {
    map: HashMap<K, usize>,
    arena: Vec<Node<K, V>>,
    head: usize,
    tail: usize,
    free: usize,
    capacity: usize,
}

impl<K, V> LruTracker<K, V> {
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl<K, V> LruTracker<K, V>
where
    K: Hash + Eq + Clone,
{
    // == Constructor ==
    /// Creates an empty tracker holding at most `capacity` entries.
    ///
    /// `capacity` must be greater than zero; the cache validates it.
    pub fn new(capacity: usize) -> Self {
        Self {
            map: HashMap::new(),
            arena: Vec::new(),
            head: NIL,
            tail: NIL,
            free: NIL,
            capacity,
        }
    }

    // == Insert Or Update ==
    /// Stores `value` under `key` at the head of the order.
    ///
    /// Returns the entry's slot and, if the insert pushed the size past
    /// capacity, the evicted tail entry. Updating an existing key never evicts.
    pub fn insert_or_update(&mut self, key: K, value: V) -> (usize, Option<Detached<K, V>>) {
        if let Some(&slot) = self.map.get(&key) {
            if let Some(entry) = self.arena[slot].entry.as_mut() {
                entry.value = value;
            }
            self.move_to_head(slot);
            return (slot, None);
        }

        let slot = self.alloc(CacheEntry::new(key.clone(), value));
        self.push_head(slot);
        self.map.insert(key, slot);

        let evicted = if self.map.len() > self.capacity {
            self.remove_tail()
        } else {
            None
        };
        (slot, evicted)
    }

    // == Lookup ==
    /// Returns the slot holding `key`, without promotion.
    pub fn slot<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.get(key).copied()
    }

    /// Returns the entry stored at `slot`.
    pub fn entry(&self, slot: usize) -> Option<&CacheEntry<K, V>> {
        self.arena.get(slot).and_then(|node| node.entry.as_ref())
    }

    /// Returns the entry stored at `slot` for in-place updates.
    pub fn entry_mut(&mut self, slot: usize) -> Option<&mut CacheEntry<K, V>> {
        self.arena.get_mut(slot).and_then(|node| node.entry.as_mut())
    }

    /// Marks the entry at `slot` as most recently used.
    pub fn promote(&mut self, slot: usize) {
        if self.entry(slot).is_some() {
            self.move_to_head(slot);
        }
    }

    /// Returns the value for `key`, promoting it on hit.
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let slot = self.slot(key)?;
        self.move_to_head(slot);
        self.entry(slot).map(|entry| &entry.value)
    }

    /// Returns the value for `key` without touching the order.
    pub fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.slot(key)
            .and_then(|slot| self.entry(slot))
            .map(|entry| &entry.value)
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.contains_key(key)
    }

    // == Remove ==
    /// Detaches the entry for `key`.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<Detached<K, V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let slot = self.slot(key)?;
        self.remove_slot(slot).map(|entry| (slot, entry))
    }

    /// Detaches the entry at `slot` and recycles the slot.
    pub fn remove_slot(&mut self, slot: usize) -> Option<CacheEntry<K, V>> {
        let entry = self.arena.get_mut(slot)?.entry.take()?;
        self.unlink(slot);
        self.map.remove(&entry.key);

        self.arena[slot].next = self.free;
        self.free = slot;
        Some(entry)
    }

    // == Tail ==
    /// Detaches the least recently used entry.
    pub fn remove_tail(&mut self) -> Option<Detached<K, V>> {
        if self.tail == NIL {
            return None;
        }
        let slot = self.tail;
        self.remove_slot(slot).map(|entry| (slot, entry))
    }

    /// Returns the least recently used entry.
    pub fn peek_tail(&self) -> Option<&CacheEntry<K, V>> {
        if self.tail == NIL {
            None
        } else {
            self.entry(self.tail)
        }
    }

    // == Snapshots ==
    /// Iterates entries from oldest to newest.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            arena: &self.arena,
            current: self.tail,
            remaining: self.map.len(),
        }
    }

    /// Keys from oldest to newest.
    pub fn keys(&self) -> Vec<K> {
        self.iter().map(|(_, entry)| entry.key.clone()).collect()
    }

    /// Values from oldest to newest.
    pub fn values(&self) -> Vec<V>
    where
        V: Clone,
    {
        self.iter().map(|(_, entry)| entry.value.clone()).collect()
    }

    // == Resize ==
    /// Sets a new capacity, detaching tail entries until the size fits.
    pub fn resize(&mut self, capacity: usize) -> Vec<Detached<K, V>> {
        self.capacity = capacity;
        let mut evicted = Vec::new();
        while self.map.len() > self.capacity {
            match self.remove_tail() {
                Some(detached) => evicted.push(detached),
                None => break,
            }
        }
        evicted
    }

    // == Clear ==
    /// Detaches every entry, oldest first, and releases the arena.
    pub fn clear(&mut self) -> Vec<CacheEntry<K, V>> {
        let mut drained = Vec::with_capacity(self.map.len());
        while let Some((_, entry)) = self.remove_tail() {
            drained.push(entry);
        }
        self.arena.clear();
        self.head = NIL;
        self.tail = NIL;
        self.free = NIL;
        drained
    }

    // == Internal list operations ==

    fn alloc(&mut self, entry: CacheEntry<K, V>) -> usize {
        let node = Node {
            entry: Some(entry),
            prev: NIL,
            next: NIL,
        };
        if self.free != NIL {
            let slot = self.free;
            self.free = self.arena[slot].next;
            self.arena[slot] = node;
            slot
        } else {
            self.arena.push(node);
            self.arena.len() - 1
        }
    }

    fn unlink(&mut self, slot: usize) {
        let prev = self.arena[slot].prev;
        let next = self.arena[slot].next;

        if prev != NIL {
            self.arena[prev].next = next;
        } else {
            self.head = next;
        }

        if next != NIL {
            self.arena[next].prev = prev;
        } else {
            self.tail = prev;
        }

        self.arena[slot].prev = NIL;
        self.arena[slot].next = NIL;
    }

    fn push_head(&mut self, slot: usize) {
        self.arena[slot].prev = NIL;
        self.arena[slot].next = self.head;

        if self.head != NIL {
            self.arena[self.head].prev = slot;
        }
        self.head = slot;

        if self.tail == NIL {
            self.tail = slot;
        }
    }

    fn move_to_head(&mut self, slot: usize) {
        if self.head == slot {
            return;
        }
        self.unlink(slot);
        self.push_head(slot);
    }
}

// == Iterator ==
/// Walks entries from least to most recently used.
pub struct Iter<'a, K, V> {
    arena: &'a [Node<K, V>],
    current: usize,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (usize, &'a CacheEntry<K, V>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.current == NIL || self.remaining == 0 {
            return None;
        }
        let slot = self.current;
        let node = &self.arena[slot];
        self.current = node.prev;
        self.remaining -= 1;
        node.entry.as_ref().map(|entry| (slot, entry))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn filled(keys: &[&'static str]) -> LruTracker<&'static str, usize> {
        let mut lru = LruTracker::new(keys.len().max(1));
        for (i, key) in keys.iter().enumerate() {
            lru.insert_or_update(*key, i);
        }
        lru
    }

    #[test]
    fn test_lru_new() {
        let lru: LruTracker<String, String> = LruTracker::new(4);
        assert!(lru.is_empty());
        assert_eq!(lru.len(), 0);
        assert_eq!(lru.capacity(), 4);
        assert!(lru.peek_tail().is_none());
    }

    #[test]
    fn test_lru_insert_new_keys() {
        let lru = filled(&["key1", "key2", "key3"]);

        assert_eq!(lru.len(), 3);
        // key1 is oldest (added first)
        assert_eq!(lru.peek_tail().map(|e| e.key), Some("key1"));
        assert_eq!(lru.keys(), vec!["key1", "key2", "key3"]);
    }

    #[test]
    fn test_lru_update_existing_key_promotes_without_eviction() {
        let mut lru = filled(&["key1", "key2", "key3"]);

        let (_, evicted) = lru.insert_or_update("key1", 42);

        assert!(evicted.is_none());
        assert_eq!(lru.len(), 3);
        assert_eq!(lru.peek(&"key1"), Some(&42));
        // key2 is now oldest
        assert_eq!(lru.peek_tail().map(|e| e.key), Some("key2"));
    }

    #[test]
    fn test_lru_insert_past_capacity_evicts_tail() {
        let mut lru = filled(&["a", "b"]);

        let (_, evicted) = lru.insert_or_update("c", 2);
        let (_, entry) = evicted.expect("tail should be evicted");

        assert_eq!(entry.into_pair(), ("a", 0));
        assert_eq!(lru.len(), 2);
        assert!(!lru.contains(&"a"));
    }

    #[test]
    fn test_lru_get_promotes_peek_does_not() {
        let mut lru = filled(&["a", "b", "c"]);

        assert_eq!(lru.peek(&"a"), Some(&0));
        assert_eq!(lru.peek_tail().map(|e| e.key), Some("a"));

        assert_eq!(lru.get(&"a"), Some(&0));
        assert_eq!(lru.peek_tail().map(|e| e.key), Some("b"));
        assert_eq!(lru.keys(), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_lru_remove() {
        let mut lru = filled(&["key1", "key2", "key3"]);

        let (_, entry) = lru.remove(&"key2").unwrap();
        assert_eq!(entry.key, "key2");

        assert_eq!(lru.len(), 2);
        assert!(!lru.contains(&"key2"));
        assert_eq!(lru.keys(), vec!["key1", "key3"]);
        assert!(lru.remove(&"nonexistent").is_none());
    }

    #[test]
    fn test_lru_remove_tail_order() {
        let mut lru = filled(&["a", "b", "c"]);
        lru.get(&"a");
        lru.get(&"c");
        lru.get(&"b");

        // Order after touches: head=[b, c, a]=tail
        let order: Vec<_> = std::iter::from_fn(|| lru.remove_tail())
            .map(|(_, e)| e.key)
            .collect();
        assert_eq!(order, vec!["a", "c", "b"]);
        assert!(lru.remove_tail().is_none());
    }

    #[test]
    fn test_lru_slots_are_recycled() {
        let mut lru = filled(&["a", "b"]);
        let (freed, _) = lru.remove(&"a").unwrap();

        let (slot, _) = lru.insert_or_update("c", 9);
        assert_eq!(slot, freed);
        assert_eq!(lru.entry(slot).map(|e| e.value), Some(9));
        assert_eq!(lru.values(), vec![1, 9]);
    }

    #[test]
    fn test_lru_resize_shrinks_from_tail() {
        let mut lru = filled(&["a", "b", "c"]);
        lru.get(&"a");

        let evicted = lru.resize(1);

        let keys: Vec<_> = evicted.into_iter().map(|(_, e)| e.key).collect();
        assert_eq!(keys, vec!["b", "c"]);
        assert_eq!(lru.keys(), vec!["a"]);
        assert_eq!(lru.capacity(), 1);
    }

    #[test]
    fn test_lru_resize_grow_keeps_entries() {
        let mut lru = filled(&["a", "b"]);
        assert!(lru.resize(10).is_empty());

        lru.insert_or_update("c", 2);
        assert_eq!(lru.len(), 3);
    }

    #[test]
    fn test_lru_clear_drains_oldest_first() {
        let mut lru = filled(&["a", "b", "c"]);

        let drained: Vec<_> = lru.clear().into_iter().map(|e| e.key).collect();

        assert_eq!(drained, vec!["a", "b", "c"]);
        assert!(lru.is_empty());
        assert!(lru.clear().is_empty());

        lru.insert_or_update("d", 3);
        assert_eq!(lru.keys(), vec!["d"]);
    }

    #[test]
    fn test_lru_borrowed_lookup() {
        let mut lru: LruTracker<String, u32> = LruTracker::new(2);
        lru.insert_or_update("owned".to_string(), 1);

        assert!(lru.contains("owned"));
        assert_eq!(lru.get("owned"), Some(&1));
    }
}
