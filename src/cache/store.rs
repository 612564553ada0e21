//! Cache Store Module
//!
//! Public cache facade combining the LRU tracker with the optional expiration
//! wheel behind a single lock.
//!
//! Every operation that removes entries collects them while holding the lock
//! and invokes the eviction callback only after releasing it, so a callback
//! may call back into the same cache.

use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::cache::{CacheEntry, CacheStats, ExpirationWheel, LruTracker};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::tasks::{spawn_sweep_task, Sweep, SweepHandle};

/// Invoked once with the key and value of every entry leaving the cache.
pub type EvictCallback<K, V> = Box<dyn Fn(K, V) + Send + Sync>;

// == Locked State ==
struct CacheState<K, V> {
    lru: LruTracker<K, V>,
    wheel: Option<ExpirationWheel>,
    stats: CacheStats,
}

impl<K, V> CacheState<K, V>
where
    K: Hash + Eq + Clone,
{
    fn is_expired(&self, slot: usize, now: Instant) -> bool {
        self.lru
            .entry(slot)
            .is_some_and(|entry| entry.is_expired(now))
    }

    /// Slot of `key` if present and not past its expiration.
    fn live_slot<Q>(&self, key: &Q, now: Instant) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.lru
            .slot(key)
            .filter(|&slot| !self.is_expired(slot, now))
    }

    fn unschedule(&mut self, slot: usize, entry: &CacheEntry<K, V>) {
        if let (Some(wheel), Some(bucket)) = (self.wheel.as_mut(), entry.bucket) {
            wheel.unschedule(slot, bucket);
        }
    }

    fn detach(&mut self, slot: usize) -> Option<CacheEntry<K, V>> {
        let entry = self.lru.remove_slot(slot)?;
        self.unschedule(slot, &entry);
        Some(entry)
    }

    /// Upserts and (re)schedules the entry. Returns the capacity victim, if any.
    fn insert(&mut self, key: K, value: V, now: Instant) -> Option<CacheEntry<K, V>> {
        let (slot, evicted) = self.lru.insert_or_update(key, value);

        let evicted = evicted.map(|(evicted_slot, entry)| {
            self.unschedule(evicted_slot, &entry);
            self.stats.record_evictions(1);
            entry
        });

        if let Some(wheel) = self.wheel.as_mut() {
            if let Some(entry) = self.lru.entry_mut(slot) {
                let (bucket, expires_at) = wheel.schedule(slot, entry.bucket, now);
                entry.bucket = Some(bucket);
                entry.expires_at = Some(expires_at);
            }
        }

        evicted
    }

    /// Sweeps one wheel bucket.
    fn advance(&mut self) -> Vec<CacheEntry<K, V>> {
        let Some(wheel) = self.wheel.as_mut() else {
            return Vec::new();
        };
        let expired: Vec<_> = wheel
            .advance()
            .into_iter()
            .filter_map(|slot| self.lru.remove_slot(slot))
            .collect();
        self.stats.record_expirations(expired.len());
        expired
    }
}

// == Shared Core ==
/// State reachable from both the facade and the sweep task.
struct Shared<K, V> {
    state: Mutex<CacheState<K, V>>,
    on_evict: Option<EvictCallback<K, V>>,
}

impl<K, V> Shared<K, V> {
    /// Runs the eviction callback. Must be called without holding the lock.
    fn notify<I>(&self, entries: I)
    where
        I: IntoIterator<Item = CacheEntry<K, V>>,
    {
        if let Some(callback) = &self.on_evict {
            for entry in entries {
                let (key, value) = entry.into_pair();
                callback(key, value);
            }
        }
    }
}

impl<K, V> Sweep for Shared<K, V>
where
    K: Hash + Eq + Clone,
{
    fn next_due(&self) -> Option<Instant> {
        self.state.lock().wheel.as_ref().and_then(|w| w.next_due())
    }

    fn sweep(&self) -> usize {
        let expired = self.state.lock().advance();
        let count = expired.len();
        self.notify(expired);
        count
    }
}

// == Cache Store ==
/// Thread-safe LRU cache with optional TTL expiration.
///
/// Share it between threads with `Arc`. When built with a TTL the cache owns a
/// background sweep task; call [`CacheStore::close`] once done with it.
///
/// After `close` the cache keeps serving requests as a plain LRU. Reads still
/// hide entries past their expiration, but nothing removes them in the
/// background anymore.
pub struct CacheStore<K, V> {
    shared: Arc<Shared<K, V>>,
    sweeper: Mutex<Option<SweepHandle>>,
    ttl: Duration,
    closed: AtomicBool,
}

impl<K, V> CacheStore<K, V>
where
    K: Hash + Eq + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    // == Constructors ==
    /// Creates a cache without expiration.
    pub fn new(capacity: usize) -> Result<Self> {
        Self::with_config(CacheConfig::new(capacity), None)
    }

    /// Creates a cache whose entries expire `ttl` after insertion or update.
    ///
    /// A non-zero `ttl` needs a running Tokio runtime.
    pub fn with_ttl(capacity: usize, ttl: Duration) -> Result<Self> {
        Self::with_config(CacheConfig::new(capacity).ttl(ttl), None)
    }

    /// Creates a cache from a full configuration and an optional eviction callback.
    ///
    /// # Errors
    /// - `InvalidConfiguration` if the capacity or bucket count is zero
    /// - `RuntimeUnavailable` if expiration is enabled outside a Tokio runtime
    pub fn with_config(config: CacheConfig, on_evict: Option<EvictCallback<K, V>>) -> Result<Self> {
        config.validate()?;

        let runtime = if config.ttl_enabled() {
            let handle = Handle::try_current()
                .map_err(|e| CacheError::RuntimeUnavailable(e.to_string()))?;
            Some(handle)
        } else {
            None
        };

        let wheel = config.ttl_enabled().then(|| ExpirationWheel::new(&config));
        let period = wheel.as_ref().map(ExpirationWheel::bucket_width);

        let shared = Arc::new(Shared {
            state: Mutex::new(CacheState {
                lru: LruTracker::new(config.capacity),
                wheel,
                stats: CacheStats::new(),
            }),
            on_evict,
        });

        let sweeper = runtime
            .zip(period)
            .map(|(handle, period)| spawn_sweep_task(&handle, Arc::clone(&shared), period));

        debug!(
            capacity = config.capacity,
            ttl_ms = u64::try_from(config.ttl.as_millis()).unwrap_or(u64::MAX),
            buckets = config.effective_buckets(),
            "Cache created"
        );

        Ok(Self {
            shared,
            sweeper: Mutex::new(sweeper),
            ttl: config.ttl,
            closed: AtomicBool::new(false),
        })
    }

    // == Add ==
    /// Inserts or updates `key`, making it the most recently used entry.
    ///
    /// With a TTL the entry's lifetime restarts. Returns true if a capacity
    /// eviction happened as a result of this call.
    pub fn add(&self, key: K, value: V) -> bool {
        let now = Instant::now();
        let evicted = self.shared.state.lock().insert(key, value, now);
        let happened = evicted.is_some();
        self.shared.notify(evicted);
        happened
    }

    // == Get ==
    /// Returns a copy of the value, promoting the entry on hit.
    ///
    /// Reads never extend the TTL. An entry found past its expiration is
    /// removed and reported as a miss.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = Instant::now();
        let mut expired = None;

        let value = {
            let mut state = self.shared.state.lock();
            match state.lru.slot(key) {
                Some(slot) if state.is_expired(slot, now) => {
                    expired = state.detach(slot);
                    state.stats.record_expirations(1);
                    state.stats.record_miss();
                    None
                }
                Some(slot) => {
                    state.lru.promote(slot);
                    state.stats.record_hit();
                    state.lru.entry(slot).map(|entry| entry.value.clone())
                }
                None => {
                    state.stats.record_miss();
                    None
                }
            }
        };

        self.shared.notify(expired);
        value
    }

    // == Peek ==
    /// Returns a copy of the value without promoting the entry.
    pub fn peek<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = Instant::now();
        let state = self.shared.state.lock();
        state
            .live_slot(key, now)
            .and_then(|slot| state.lru.entry(slot))
            .map(|entry| entry.value.clone())
    }

    /// Checks for a live entry without promoting it.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = Instant::now();
        self.shared.state.lock().live_slot(key, now).is_some()
    }

    // == Conditional Adds ==
    /// Adds the entry only if `key` is absent.
    ///
    /// Returns `(found, evicted)`. A present key is left untouched.
    pub fn contains_or_add(&self, key: K, value: V) -> (bool, bool) {
        let now = Instant::now();
        let (found, evicted) = {
            let mut state = self.shared.state.lock();
            if state.live_slot(&key, now).is_some() {
                (true, None)
            } else {
                (false, state.insert(key, value, now))
            }
        };
        let happened = evicted.is_some();
        self.shared.notify(evicted);
        (found, happened)
    }

    /// Returns the current value if present, otherwise adds the entry.
    ///
    /// Returns `(previous, evicted)`. A present key is neither promoted nor
    /// modified.
    pub fn peek_or_add(&self, key: K, value: V) -> (Option<V>, bool) {
        let now = Instant::now();
        let (previous, evicted) = {
            let mut state = self.shared.state.lock();
            match state.live_slot(&key, now) {
                Some(slot) => (state.lru.entry(slot).map(|e| e.value.clone()), None),
                None => (None, state.insert(key, value, now)),
            }
        };
        let happened = evicted.is_some();
        self.shared.notify(evicted);
        (previous, happened)
    }

    // == Remove ==
    /// Removes `key`, returning whether it was present.
    pub fn remove<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let removed = {
            let mut state = self.shared.state.lock();
            state.lru.remove(key).map(|(slot, entry)| {
                state.unschedule(slot, &entry);
                entry
            })
        };
        let present = removed.is_some();
        self.shared.notify(removed);
        present
    }

    /// Removes and returns the least recently used entry.
    pub fn remove_oldest(&self) -> Option<(K, V)> {
        let removed = {
            let mut state = self.shared.state.lock();
            state.lru.remove_tail().map(|(slot, entry)| {
                state.unschedule(slot, &entry);
                entry
            })
        };
        let pair = removed
            .as_ref()
            .map(|entry| (entry.key.clone(), entry.value.clone()));
        self.shared.notify(removed);
        pair
    }

    /// Returns the least recently used entry without touching it.
    pub fn get_oldest(&self) -> Option<(K, V)> {
        let state = self.shared.state.lock();
        state
            .lru
            .peek_tail()
            .map(|entry| (entry.key.clone(), entry.value.clone()))
    }

    // == Snapshots ==
    /// Live keys from oldest to newest.
    pub fn keys(&self) -> Vec<K> {
        let now = Instant::now();
        let state = self.shared.state.lock();
        state
            .lru
            .iter()
            .filter(|(_, entry)| !entry.is_expired(now))
            .map(|(_, entry)| entry.key.clone())
            .collect()
    }

    /// Live values from oldest to newest.
    pub fn values(&self) -> Vec<V> {
        let now = Instant::now();
        let state = self.shared.state.lock();
        state
            .lru
            .iter()
            .filter(|(_, entry)| !entry.is_expired(now))
            .map(|(_, entry)| entry.value.clone())
            .collect()
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.shared.state.lock().lru.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.shared.state.lock().lru.capacity()
    }

    /// Configured lifetime, `Duration::ZERO` when expiration is off.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let state = self.shared.state.lock();
        let mut stats = state.stats.clone();
        stats.set_total_entries(state.lru.len());
        stats
    }

    // == Resize ==
    /// Changes the capacity, evicting least recently used entries to fit.
    ///
    /// Returns the number of entries evicted.
    pub fn resize(&self, size: usize) -> Result<usize> {
        if size == 0 {
            return Err(CacheError::InvalidConfiguration(
                "cache size must be greater than 0".to_string(),
            ));
        }

        let evicted = {
            let mut state = self.shared.state.lock();
            let mut evicted = Vec::new();
            for (slot, entry) in state.lru.resize(size) {
                state.unschedule(slot, &entry);
                evicted.push(entry);
            }
            state.stats.record_evictions(evicted.len());
            evicted
        };

        let count = evicted.len();
        self.shared.notify(evicted);
        Ok(count)
    }

    // == Purge ==
    /// Removes every entry. The eviction callback runs for each of them.
    pub fn purge(&self) {
        let drained = {
            let mut state = self.shared.state.lock();
            if let Some(wheel) = state.wheel.as_mut() {
                wheel.clear();
            }
            state.lru.clear()
        };
        self.shared.notify(drained);
    }

    // == Force Sweep ==
    /// Runs two full wheel rotations synchronously.
    ///
    /// Every scheduled entry is removed regardless of its age. Meant for tests
    /// and operational flushes that must not depend on the sweep task's timing.
    /// Returns the number of entries removed; always 0 without a TTL.
    pub fn force_sweep(&self) -> usize {
        let expired = {
            let mut state = self.shared.state.lock();
            let rounds = state.wheel.as_ref().map_or(0, |w| 2 * w.num_buckets());
            let mut expired = Vec::new();
            for _ in 0..rounds {
                expired.extend(state.advance());
            }
            expired
        };
        let count = expired.len();
        self.shared.notify(expired);
        count
    }

    // == Manual Expiration ==
    /// Marks `key` as expired now, returning whether a live entry was found.
    ///
    /// Reads stop seeing the entry immediately. With a TTL it moves into the
    /// bucket swept next; [`CacheStore::trigger_expiration`] removes it at once.
    pub fn expire_item<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = Instant::now();
        let mut guard = self.shared.state.lock();
        let state = &mut *guard;
        let Some(slot) = state.live_slot(key, now) else {
            return false;
        };
        let Some(entry) = state.lru.entry_mut(slot) else {
            return false;
        };

        entry.expires_at = Some(now);
        if let Some(wheel) = state.wheel.as_mut() {
            entry.bucket = Some(wheel.schedule_now(slot, entry.bucket, now));
        }
        true
    }

    /// Removes every entry already past its expiration, leaving live ones.
    ///
    /// Scans the whole cache. Returns the number of entries removed.
    pub fn trigger_expiration(&self) -> usize {
        let now = Instant::now();
        let expired = {
            let mut state = self.shared.state.lock();
            let slots: Vec<usize> = state
                .lru
                .iter()
                .filter(|(_, entry)| entry.is_expired(now))
                .map(|(slot, _)| slot)
                .collect();
            let expired: Vec<_> = slots
                .into_iter()
                .filter_map(|slot| state.detach(slot))
                .collect();
            state.stats.record_expirations(expired.len());
            expired
        };
        let count = expired.len();
        if count > 0 {
            debug!("Expired {} entries on demand", count);
        }
        self.shared.notify(expired);
        count
    }
}

impl<K, V> CacheStore<K, V> {
    // == Close ==
    /// Stops the sweep task and waits for it to exit.
    ///
    /// Idempotent, and a no-op for caches without a TTL.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let handle = self.sweeper.lock().take();
        if let Some(handle) = handle {
            handle.shutdown().await;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl<K, V> fmt::Debug for CacheStore<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("CacheStore")
            .field("capacity", &state.lru.capacity())
            .field("len", &state.lru.len())
            .field("ttl", &self.ttl)
            .field("stats", &state.stats)
            .finish()
    }
}

impl<K, V> Drop for CacheStore<K, V> {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.get_mut().take() {
            warn!("TTL cache dropped without close(), aborting sweep task");
            handle.abort();
        }
    }
}
