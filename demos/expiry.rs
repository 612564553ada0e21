//! Expiry demo
//!
//! Fills a TTL cache, lets the sweep task expire entries and prints what the
//! eviction callback observed.
//!
//! ```text
//! CACHE_CAPACITY=4 CACHE_TTL_MS=500 RUST_LOG=expiring_lru=debug cargo run --example expiry
//! ```

use std::sync::Arc;
use std::time::Duration;

use expiring_lru::{CacheConfig, CacheStore};
use parking_lot::Mutex;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "debug" for the cache, can be overridden with RUST_LOG
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "expiring_lru=debug,expiry=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = CacheConfig::from_env();
    if !config.ttl_enabled() {
        config = config.ttl(Duration::from_millis(500));
    }
    info!(
        "Configuration loaded: capacity={}, ttl={}ms, buckets={}",
        config.capacity,
        config.ttl.as_millis(),
        config.buckets
    );

    let evicted: Arc<Mutex<Vec<(String, u64)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&evicted);
    let ttl = config.ttl;
    let capacity = config.capacity;

    let cache = CacheStore::with_config(
        config,
        Some(Box::new(move |key: String, value: u64| {
            sink.lock().push((key, value));
        })),
    )?;

    for i in 0..(capacity as u64 + 2) {
        if cache.add(format!("key{}", i), i) {
            info!("Adding key{} evicted the least recently used entry", i);
        }
    }
    info!("Live keys: {:?}", cache.keys());

    tokio::time::sleep(ttl + ttl / 2).await;
    info!("After {}ms: {} entries left", (ttl + ttl / 2).as_millis(), cache.len());

    cache.close().await;
    info!("Stats: {:?}", cache.stats());
    info!("Evicted: {:?}", evicted.lock());

    Ok(())
}
