//! Configuration Module
//!
//! Construction parameters for a cache instance, loadable from environment
//! variables.

use std::env;
use std::time::Duration;

use crate::error::{CacheError, Result};

/// Number of wheel buckets used when none is configured.
pub const DEFAULT_BUCKETS: usize = 100;

/// Smallest bucket width the wheel is sliced into. Shorter lifetimes get
/// fewer buckets instead of narrower ones.
pub const MIN_BUCKET_WIDTH: Duration = Duration::from_millis(1);

/// Longest lifetime an entry is scheduled for. Larger TTLs are capped here so
/// expiration instants stay representable.
pub const MAX_TTL: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Cache configuration parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of entries the cache can hold
    pub capacity: usize,
    /// Entry lifetime, `Duration::ZERO` disables expiration
    pub ttl: Duration,
    /// Number of time-wheel buckets the TTL window is sliced into
    pub buckets: usize,
}

impl CacheConfig {
    /// Creates a config with the given capacity and expiration disabled.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Sets the entry lifetime.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets the number of wheel buckets.
    pub fn buckets(mut self, buckets: usize) -> Self {
        self.buckets = buckets;
        self
    }

    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_CAPACITY` - Maximum cache entries (default: 1000)
    /// - `CACHE_TTL_MS` - Entry lifetime in milliseconds, 0 disables (default: 0)
    /// - `CACHE_BUCKETS` - Time-wheel bucket count (default: 100)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            capacity: env::var("CACHE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.capacity),
            ttl: env::var("CACHE_TTL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.ttl),
            buckets: env::var("CACHE_BUCKETS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.buckets),
        }
    }

    /// Returns true if entries expire.
    pub fn ttl_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    /// Lifetime entries are scheduled for, capped at [`MAX_TTL`].
    pub fn effective_ttl(&self) -> Duration {
        self.ttl.min(MAX_TTL)
    }

    /// Number of buckets the wheel actually uses.
    ///
    /// Lowered so that no bucket is narrower than [`MIN_BUCKET_WIDTH`], at
    /// least 1. One full rotation always spans the TTL.
    pub fn effective_buckets(&self) -> usize {
        let fit = self.effective_ttl().as_nanos() / MIN_BUCKET_WIDTH.as_nanos();
        let fit = usize::try_from(fit).unwrap_or(usize::MAX);
        let max = usize::try_from(u32::MAX).unwrap_or(usize::MAX);
        self.buckets.min(fit).min(max).max(1)
    }

    /// Width of one wheel bucket, `effective_ttl / effective_buckets`.
    pub fn bucket_width(&self) -> Duration {
        let buckets = u32::try_from(self.effective_buckets()).unwrap_or(u32::MAX);
        self.effective_ttl() / buckets
    }

    /// Checks the parameters before a cache is built from them.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(CacheError::InvalidConfiguration(
                "capacity must be greater than 0".to_string(),
            ));
        }
        if self.ttl_enabled() && self.buckets == 0 {
            return Err(CacheError::InvalidConfiguration(
                "bucket count must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            ttl: Duration::ZERO,
            buckets: DEFAULT_BUCKETS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = CacheConfig::default();
        assert_eq!(config.capacity, 1000);
        assert_eq!(config.ttl, Duration::ZERO);
        assert_eq!(config.buckets, DEFAULT_BUCKETS);
        assert!(!config.ttl_enabled());
    }

    #[test]
    fn test_config_from_env_defaults() {
        env::remove_var("CACHE_CAPACITY");
        env::remove_var("CACHE_TTL_MS");
        env::remove_var("CACHE_BUCKETS");

        assert_eq!(CacheConfig::from_env(), CacheConfig::default());
    }

    #[test]
    fn test_builder_setters() {
        let config = CacheConfig::new(8)
            .ttl(Duration::from_millis(100))
            .buckets(10);

        assert_eq!(config.capacity, 8);
        assert!(config.ttl_enabled());
        assert_eq!(config.bucket_width(), Duration::from_millis(10));
    }

    #[test]
    fn test_short_ttl_uses_fewer_buckets() {
        let config = CacheConfig::new(8).ttl(Duration::from_millis(10));
        assert_eq!(config.effective_buckets(), 10);
        assert_eq!(config.bucket_width(), MIN_BUCKET_WIDTH);

        let config = CacheConfig::new(8).ttl(Duration::from_micros(2500));
        assert_eq!(config.effective_buckets(), 2);
        assert_eq!(config.bucket_width(), Duration::from_micros(1250));

        // Below the minimum width a single bucket spans the whole TTL
        let config = CacheConfig::new(8).ttl(Duration::from_micros(50));
        assert_eq!(config.effective_buckets(), 1);
        assert_eq!(config.bucket_width(), Duration::from_micros(50));
    }

    #[test]
    fn test_rotation_spans_ttl() {
        for ms in [1u64, 7, 10, 99, 100, 1_000, 12_345] {
            let config = CacheConfig::new(8).ttl(Duration::from_millis(ms));
            let buckets = u32::try_from(config.effective_buckets()).unwrap();
            assert!(config.bucket_width() >= MIN_BUCKET_WIDTH);
            assert!(config.bucket_width() * buckets <= config.ttl);
            assert!(config.ttl - config.bucket_width() * buckets < config.bucket_width());
        }
    }

    #[test]
    fn test_huge_ttl_is_capped() {
        let config = CacheConfig::new(8).ttl(Duration::MAX);
        assert!(config.ttl_enabled());
        assert!(config.validate().is_ok());
        assert_eq!(config.effective_ttl(), MAX_TTL);
        assert_eq!(config.effective_buckets(), DEFAULT_BUCKETS);
        assert_eq!(config.bucket_width(), MAX_TTL / 100);
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let result = CacheConfig::new(0).validate();
        assert!(matches!(result, Err(CacheError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_validate_rejects_zero_buckets_with_ttl() {
        let config = CacheConfig::new(4).ttl(Duration::from_secs(1)).buckets(0);
        assert!(matches!(
            config.validate(),
            Err(CacheError::InvalidConfiguration(_))
        ));

        // Bucket count is irrelevant when expiration is off
        assert!(CacheConfig::new(4).buckets(0).validate().is_ok());
    }
}
