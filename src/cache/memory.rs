use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::trace;

use super::{Cache, CacheError};

#[derive(Debug, Clone, Copy)]
struct Entry {
    value: i64,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// In-process cache on a sharded concurrent map.
///
/// Expired entries are invisible to readers immediately and are physically
/// removed either lazily (on access) or by [`MemoryCache::purge_expired`],
/// which the application state calls from a background task.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, Entry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry and return how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let keep = !entry.is_expired(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<i64>, CacheError> {
        let now = Instant::now();

        // The shard guard must be released before remove_if takes it again
        let lookup = self
            .entries
            .get(key)
            .map(|entry| (!entry.is_expired(now)).then_some(entry.value));

        match lookup {
            Some(Some(value)) => Ok(Some(value)),
            Some(None) => {
                self.entries.remove_if(key, |_, entry| entry.is_expired(now));
                trace!(key, "Evicted expired cache entry");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: i64, ttl: Duration) -> Result<(), CacheError> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn increment(&self, key: &str) -> Result<i64, CacheError> {
        let now = Instant::now();
        let mut entry = self.entries.entry(key.to_string()).or_insert(Entry {
            value: 0,
            expires_at: None,
        });

        if entry.is_expired(now) {
            *entry = Entry {
                value: 0,
                expires_at: None,
            };
        }

        entry.value = entry
            .value
            .checked_add(1)
            .ok_or_else(|| CacheError::Overflow(key.to_string()))?;
        Ok(entry.value)
    }
}
