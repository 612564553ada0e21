//! Expiring LRU - A generic in-memory cache
//!
//! Bounds the number of entries with least-recently-used eviction and,
//! when a TTL is configured, expires entries through a time wheel swept
//! by a background Tokio task.

pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;

pub use cache::{CacheStats, CacheStore, EvictCallback};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
