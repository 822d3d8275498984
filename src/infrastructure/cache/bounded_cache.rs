//! Fixed-capacity LRU cache shared between request handlers.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Index into the slot arena.
type SlotIndex = usize;

/// Sentinel for "no neighbour".
const NIL: SlotIndex = usize::MAX;

struct Slot<K, V> {
    key: K,
    value: V,
    prev: SlotIndex,
    next: SlotIndex,
}

/// Counters describing how the cache has been used since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub insertions: u64,
    pub evictions: u64,
    pub removals: u64,
    pub len: usize,
    pub capacity: usize,
}

impl CacheStats {
    /// Fraction of lookups that were hits, `0.0` when nothing was looked up yet.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// State guarded by the cache mutex.
///
/// The index and the recency list are only ever mutated together, so
/// `index.len()` always equals the number of linked slots.
struct Inner<K, V> {
    slots: Vec<Option<Slot<K, V>>>,
    free: Vec<SlotIndex>,
    index: HashMap<K, SlotIndex>,
    /// Most recently used.
    head: SlotIndex,
    /// Least recently used.
    tail: SlotIndex,
    stats: CacheStats,
}

impl<K: Hash + Eq + Clone, V> Inner<K, V> {
    fn slot(&self, idx: SlotIndex) -> &Slot<K, V> {
        self.slots[idx]
            .as_ref()
            .unwrap_or_else(|| unreachable!("slot {idx} is linked but empty"))
    }

    fn slot_mut(&mut self, idx: SlotIndex) -> &mut Slot<K, V> {
        self.slots[idx]
            .as_mut()
            .unwrap_or_else(|| unreachable!("slot {idx} is linked but empty"))
    }

    fn unlink(&mut self, idx: SlotIndex) {
        let (prev, next) = {
            let slot = self.slot(idx);
            (slot.prev, slot.next)
        };

        if prev == NIL {
            self.head = next;
        } else {
            self.slot_mut(prev).next = next;
        }

        if next == NIL {
            self.tail = prev;
        } else {
            self.slot_mut(next).prev = prev;
        }
    }

    fn push_front(&mut self, idx: SlotIndex) {
        let old_head = self.head;
        {
            let slot = self.slot_mut(idx);
            slot.prev = NIL;
            slot.next = old_head;
        }

        if old_head == NIL {
            self.tail = idx;
        } else {
            self.slot_mut(old_head).prev = idx;
        }
        self.head = idx;
    }

    fn promote(&mut self, idx: SlotIndex) {
        if self.head != idx {
            self.unlink(idx);
            self.push_front(idx);
        }
    }

    /// Detaches a slot from the list and the arena, returning its contents.
    fn take(&mut self, idx: SlotIndex) -> Slot<K, V> {
        self.unlink(idx);
        let slot = self.slots[idx]
            .take()
            .unwrap_or_else(|| unreachable!("slot {idx} is linked but empty"));
        self.free.push(idx);
        slot
    }

    fn evict_lru(&mut self) {
        let tail = self.tail;
        if tail == NIL {
            return;
        }
        let slot = self.take(tail);
        self.index.remove(&slot.key);
        self.stats.evictions += 1;
        metrics::counter!("url_shortener_cache_evictions_total").increment(1);
    }

    fn insert_new(&mut self, key: K, value: V, capacity: usize) {
        if self.index.len() >= capacity {
            self.evict_lru();
        }

        let slot = Slot {
            key: key.clone(),
            value,
            prev: NIL,
            next: NIL,
        };
        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(slot);
                idx
            }
            None => {
                self.slots.push(Some(slot));
                self.slots.len() - 1
            }
        };

        self.index.insert(key, idx);
        self.push_front(idx);
        self.stats.insertions += 1;
    }
}

/// A thread-safe, fixed-capacity key/value cache with least-recently-used eviction.
///
/// Entries live in an arena of slots linked by index into a recency list, so
/// `get`, `put` and `remove` are all O(1). A single mutex guards both the
/// key index and the list; the lock is never held across an `.await`.
///
/// Values are returned by clone. Store `Arc`s when values are large or need
/// shared interior state (as the admission limiter does with its buckets).
pub struct BoundedCache<K, V> {
    capacity: usize,
    inner: Mutex<Inner<K, V>>,
}

impl<K: Hash + Eq + Clone, V: Clone> BoundedCache<K, V> {
    /// Creates a cache holding at most `capacity` entries.
    ///
    /// A capacity of zero is clamped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            inner: Mutex::new(Inner {
                slots: Vec::with_capacity(capacity),
                free: Vec::new(),
                index: HashMap::with_capacity(capacity),
                head: NIL,
                tail: NIL,
                stats: CacheStats::default(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<K, V>> {
        // Every mutation leaves the structure consistent before it can panic,
        // so a poisoned lock still guards a valid cache.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the value for `key`, marking it most recently used.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut inner = self.lock();
        match inner.index.get(key).copied() {
            Some(idx) => {
                inner.promote(idx);
                inner.stats.hits += 1;
                Some(inner.slot(idx).value.clone())
            }
            None => {
                inner.stats.misses += 1;
                None
            }
        }
    }

    /// Inserts or overwrites `key`, marking it most recently used.
    ///
    /// Inserting a new key into a full cache evicts exactly one entry, the
    /// least recently used one.
    pub fn put(&self, key: K, value: V) {
        let mut inner = self.lock();
        if let Some(idx) = inner.index.get(&key).copied() {
            inner.slot_mut(idx).value = value;
            inner.promote(idx);
            return;
        }
        inner.insert_new(key, value, self.capacity);
    }

    /// Returns the cached value for `key`, inserting `make()` first on a miss.
    ///
    /// Lookup and insertion happen under one lock acquisition, so concurrent
    /// callers racing on the same missing key all observe the same value.
    pub fn get_or_insert_with<Q, F>(&self, key: &Q, make: F) -> V
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
        F: FnOnce() -> V,
    {
        let mut inner = self.lock();
        if let Some(idx) = inner.index.get(key).copied() {
            inner.promote(idx);
            inner.stats.hits += 1;
            return inner.slot(idx).value.clone();
        }

        inner.stats.misses += 1;
        let value = make();
        inner.insert_new(key.to_owned(), value.clone(), self.capacity);
        value
    }

    /// Removes `key`, returning its value if it was cached.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut inner = self.lock();
        let idx = inner.index.remove(key)?;
        let slot = inner.take(idx);
        inner.stats.removals += 1;
        Some(slot.value)
    }

    /// Returns true if `key` is cached. Does not affect recency.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.lock().index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Snapshot of the usage counters.
    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            len: inner.index.len(),
            capacity: self.capacity,
            ..inner.stats
        }
    }

    /// Keys from most to least recently used.
    #[cfg(test)]
    fn keys_by_recency(&self) -> Vec<K> {
        let inner = self.lock();
        let mut keys = Vec::with_capacity(inner.index.len());
        let mut cursor = inner.head;
        while cursor != NIL {
            let slot = inner.slot(cursor);
            keys.push(slot.key.clone());
            cursor = slot.next;
        }
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_get_on_empty_cache() {
        let cache: BoundedCache<String, i32> = BoundedCache::new(3);

        assert_eq!(cache.get("missing"), None);
        assert!(cache.is_empty());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let cache = BoundedCache::new(0);
        assert_eq!(cache.capacity(), 1);

        cache.put("a", 1);
        cache.put("b", 2);

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"b"), Some(2));
        assert_eq!(cache.get(&"a"), None);
    }

    #[test]
    fn test_len_never_exceeds_capacity() {
        let cache = BoundedCache::new(4);

        for i in 0..50 {
            cache.put(i % 7, i);
            assert!(cache.len() <= 4);
            assert_eq!(cache.keys_by_recency().len(), cache.len());
        }
    }

    #[test]
    fn test_overflow_evicts_least_recent() {
        let cache = BoundedCache::new(3);

        cache.put("k1", 1);
        cache.put("k2", 2);
        cache.put("k3", 3);
        cache.put("k4", 4);

        assert_eq!(cache.get(&"k1"), None);
        assert_eq!(cache.get(&"k4"), Some(4));
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_get_promotes_entry() {
        let promoted = BoundedCache::new(3);
        let untouched = BoundedCache::new(3);

        for cache in [&promoted, &untouched] {
            cache.put("k", 0);
            cache.put("x1", 1);
            cache.put("x2", 2);
        }

        assert_eq!(promoted.get(&"k"), Some(0));

        for cache in [&promoted, &untouched] {
            cache.put("n1", 10);
            cache.put("n2", 20);
        }

        assert_eq!(promoted.get(&"k"), Some(0));
        assert_eq!(untouched.get(&"k"), None);
    }

    #[test]
    fn test_put_existing_key_repositions_without_growth() {
        let cache = BoundedCache::new(3);
        cache.put("a", 1);
        cache.put("b", 2);
        cache.put("c", 3);

        cache.put("a", 100);

        assert_eq!(cache.len(), 3);
        assert_eq!(cache.keys_by_recency(), vec!["a", "c", "b"]);
        assert_eq!(cache.get(&"a"), Some(100));

        cache.put("d", 4);
        assert_eq!(cache.get(&"b"), None);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_remove_unlinks_and_reuses_slot() {
        let cache = BoundedCache::new(2);
        cache.put("a", 1);
        cache.put("b", 2);

        assert_eq!(cache.remove(&"a"), Some(1));
        assert_eq!(cache.remove(&"a"), None);
        assert_eq!(cache.len(), 1);

        cache.put("c", 3);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().evictions, 0);
        assert_eq!(cache.keys_by_recency(), vec!["c", "b"]);
    }

    #[test]
    fn test_remove_only_entry_resets_list() {
        let cache = BoundedCache::new(1);
        cache.put("only", 1);
        cache.remove(&"only");

        assert!(cache.is_empty());
        assert!(cache.keys_by_recency().is_empty());

        cache.put("next", 2);
        assert_eq!(cache.keys_by_recency(), vec!["next"]);
    }

    #[test]
    fn test_get_or_insert_with_inserts_once() {
        let cache = BoundedCache::new(2);

        let first = cache.get_or_insert_with(&"k", || 1);
        let second = cache.get_or_insert_with(&"k", || 2);

        assert_eq!(first, 1);
        assert_eq!(second, 1);
        let stats = cache.stats();
        assert_eq!(stats.insertions, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_hit_ratio() {
        let cache = BoundedCache::new(2);
        assert_eq!(cache.stats().hit_ratio(), 0.0);

        cache.put(1, "one");
        cache.get(&1);
        cache.get(&2);

        assert_eq!(cache.stats().hit_ratio(), 0.5);
    }

    #[test]
    fn test_concurrent_access_keeps_bound() {
        let cache = Arc::new(BoundedCache::new(16));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..1_000 {
                        let key = (t * 31 + i) % 64;
                        if i % 3 == 0 {
                            cache.get(&key);
                        } else {
                            cache.put(key, i);
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert!(cache.len() <= 16);
        assert_eq!(cache.keys_by_recency().len(), cache.len());
    }
}
