//! Error types for the cache
//!
//! Provides unified error handling using thiserror. Misses and evictions are
//! normal outcomes and never surface here.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Rejected construction or resize parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// TTL requested but no Tokio runtime is available for the sweep task
    #[error("Runtime unavailable: {0}")]
    RuntimeUnavailable(String),
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
