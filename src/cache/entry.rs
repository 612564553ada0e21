//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL metadata.

use tokio::time::Instant;

// == Cache Entry ==
/// Represents a single cached mapping and its wheel placement.
#[derive(Debug, Clone)]
pub struct CacheEntry<K, V> {
    /// The lookup key
    pub key: K,
    /// The stored value
    pub value: V,
    /// Expiration instant, None when the cache has no TTL
    pub expires_at: Option<Instant>,
    /// Wheel bucket currently owning this entry, None when the cache has no TTL
    pub bucket: Option<usize>,
}

impl<K, V> CacheEntry<K, V> {
    // == Constructor ==
    /// Creates an unscheduled entry.
    pub fn new(key: K, value: V) -> Self {
        Self {
            key,
            value,
            expires_at: None,
            bucket: None,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired at `now`.
    ///
    /// An entry is expired once `now` reaches its expiration instant, so an
    /// entry scheduled at `t` is live for exactly `[t, t + ttl)`.
    pub fn is_expired(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(expires) => now >= expires,
            None => false,
        }
    }

    /// Splits the entry into its key and value.
    pub fn into_pair(self) -> (K, V) {
        (self.key, self.value)
    }
}
