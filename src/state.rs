//! Shared application state for Axum handlers and middleware.
//!
//! Holds the configuration, the cache that backs rate limiting, and the
//! authenticator. Everything is behind `Arc`, so cloning per request is cheap.
//!
//! # Structured Concurrency
//!
//! With the in-process cache a background task periodically purges expired
//! entries. It is tracked with `tokio_util::task::TaskTracker` and stopped via
//! `CancellationToken`; call [`AppState::shutdown`] before exit.

use std::sync::Arc;
use std::time::Instant;

use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, trace};

use crate::auth::{Authenticator, CredentialVerifier, UserRepository};
use crate::cache::{Cache, CacheBackend, MemoryCache};
use crate::config::Config;
use crate::error::AppResult;
use crate::metrics;

/// Shared application state.
///
/// # Lifecycle
///
/// ```rust,ignore
/// let state = AppState::new(config, CacheBackend::memory(), users)?;
/// // ... serve ...
/// state.shutdown().await;
/// ```
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// Counter store used by the rate limiter
    pub cache: Arc<dyn Cache>,
    /// Bearer authentication chain used by the `CurrentUser` extractor
    pub authenticator: Authenticator,
    /// Timestamp when the application started
    pub started_at: Instant,
    cache_backend: &'static str,
    task_tracker: TaskTracker,
    cancellation_token: CancellationToken,
}

impl AppState {
    /// Build state and start background tasks.
    ///
    /// Must be called inside a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if the token verifier cannot be built
    /// from the configured secret and algorithm.
    pub fn new(
        config: Config,
        cache: CacheBackend,
        users: Arc<dyn UserRepository>,
    ) -> AppResult<Self> {
        let verifier = CredentialVerifier::new(&config.jwt_secret_key, config.jwt_algorithm)?;
        let authenticator = Authenticator::new(verifier, users);

        let state = Self {
            cache: cache.shared(),
            cache_backend: cache.kind(),
            authenticator,
            started_at: Instant::now(),
            config: Arc::new(config),
            task_tracker: TaskTracker::new(),
            cancellation_token: CancellationToken::new(),
        };

        if let CacheBackend::Memory(memory) = cache {
            state.spawn_cache_sweep_task(memory);
        }

        Ok(state)
    }

    /// Name of the cache backend ("memory" or "redis").
    pub fn cache_backend(&self) -> &'static str {
        self.cache_backend
    }

    fn spawn_cache_sweep_task(&self, cache: Arc<MemoryCache>) {
        let every = self.config.cache_sweep_interval;
        let cancel = self.cancellation_token.clone();

        self.task_tracker.spawn(async move {
            let mut ticker = interval(every);
            ticker.tick().await; // Skip the first immediate tick

            loop {
                tokio::select! {
                    biased;

                    _ = cancel.cancelled() => {
                        debug!("Cache sweep task received cancellation signal");
                        break;
                    }
                    _ = ticker.tick() => {
                        sweep(&cache);
                    }
                }
            }

            debug!("Cache sweep task shutting down");
        });
    }

    /// Stop background tasks and wait for them to finish.
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown of background tasks");

        self.cancellation_token.cancel();
        self.task_tracker.close();
        self.task_tracker.wait().await;

        info!("All background tasks have completed");
    }

    /// Get the application uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

fn sweep(cache: &MemoryCache) {
    let removed = cache.purge_expired();
    let remaining = cache.len();
    metrics::set_cache_entries(remaining);
    trace!(removed, remaining, "Swept expired cache entries");
}
