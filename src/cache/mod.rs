//! Cache Module
//!
//! Provides in-memory caching with LRU eviction and time-wheel TTL expiration.

mod entry;
mod lru;
mod stats;
mod store;
mod wheel;


// Re-export public types
pub use entry::CacheEntry;
pub use lru::LruTracker;
pub use stats::CacheStats;
pub use store::{CacheStore, EvictCallback};
pub use wheel::ExpirationWheel;
