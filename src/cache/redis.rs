use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use tracing::info;

use super::{Cache, CacheError};

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::Backend(err.to_string())
    }
}

/// Redis-backed cache.
///
/// Holds one multiplexed connection; clones share it, so handing a clone to
/// each middleware instance costs nothing.
#[derive(Clone)]
pub struct RedisCache {
    connection: MultiplexedConnection,
}

impl RedisCache {
    /// Open a client for `redis_url` and establish the multiplexed connection.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Backend` if the URL is invalid or the server
    /// cannot be reached.
    pub async fn connect(redis_url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        let connection = client.get_multiplexed_async_connection().await?;
        info!("Connected to Redis cache");
        Ok(Self { connection })
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<i64>, CacheError> {
        let mut con = self.connection.clone();
        let value: Option<i64> = con.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: i64, ttl: Duration) -> Result<(), CacheError> {
        let mut con = self.connection.clone();
        // SET EX has whole-second resolution and rejects zero
        let seconds = ttl.as_secs().max(1);
        con.set_ex::<_, _, ()>(key, value, seconds).await?;
        Ok(())
    }

    async fn increment(&self, key: &str) -> Result<i64, CacheError> {
        let mut con = self.connection.clone();
        let value: i64 = con.incr(key, 1).await?;
        Ok(value)
    }
}
