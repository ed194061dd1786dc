//! Shared key-value store backing the rate limiter's counters.
//!
//! The limiter only needs three operations, so the store is abstracted behind
//! the [`Cache`] trait:
//!
//! - `get(key)` - current integer value, or `None` when absent or expired
//! - `set(key, value, ttl)` - write a value that the store expires after `ttl`
//! - `increment(key)` - add one, leaving any existing expiry untouched
//!
//! Expiry is enforced by the store itself, never by callers.
//!
//! # Backends
//!
//! - [`MemoryCache`]: sharded in-process map. Counters are per instance.
//! - [`RedisCache`]: Redis over a multiplexed connection. Counters are shared
//!   by every instance pointing at the same server.
//!
//! [`CacheBackend::connect`] picks Redis when `REDIS_URL` is configured.

mod memory;
mod redis;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use self::memory::MemoryCache;
pub use self::redis::RedisCache;

/// Errors raised by a cache backend.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Backend(String),

    #[error("counter overflow for key {0}")]
    Overflow(String),
}

/// Minimal counter store with per-key expiry.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Read the value stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<i64>, CacheError>;

    /// Store `value` under `key`, expiring after `ttl`.
    async fn set(&self, key: &str, value: i64, ttl: Duration) -> Result<(), CacheError>;

    /// Increment the value under `key` by one and return the new value.
    ///
    /// A missing key starts from zero and has no expiry.
    async fn increment(&self, key: &str) -> Result<i64, CacheError>;
}

/// The configured cache backend.
#[derive(Clone)]
pub enum CacheBackend {
    Memory(Arc<MemoryCache>),
    Redis(RedisCache),
}

impl CacheBackend {
    /// In-process backend.
    pub fn memory() -> Self {
        Self::Memory(Arc::new(MemoryCache::new()))
    }

    /// Connect to Redis when a URL is given, otherwise fall back to memory.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Backend` if the Redis URL is invalid or the
    /// server cannot be reached.
    pub async fn connect(redis_url: Option<&str>) -> Result<Self, CacheError> {
        match redis_url {
            Some(url) => Ok(Self::Redis(RedisCache::connect(url).await?)),
            None => Ok(Self::memory()),
        }
    }

    /// Trait object handed to the middleware.
    pub fn shared(&self) -> Arc<dyn Cache> {
        match self {
            Self::Memory(cache) => cache.clone(),
            Self::Redis(cache) => Arc::new(cache.clone()),
        }
    }

    /// Backend name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::Redis(_) => "redis",
        }
    }
}
