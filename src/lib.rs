//! # front_door
//!
//! The request-processing front door of an HTTP service, built on Axum and
//! Tower:
//!
//! - **Correlation**: every request gets an `X-Request-Id`, bound to a
//!   task-local and a `request` tracing span so all of its log lines carry it
//! - **Rate limiting**: fixed-window counters per client in a shared cache
//!   (in-process or Redis), failing closed when the cache is unavailable
//! - **Authentication**: bearer JWTs resolved to a user for API routes, HTTP
//!   Basic for the documentation pages
//! - **Failure normalization**: panics and internal errors become a JSON 500
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum HTTP Server                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Pipeline (Request ID → Trace → Rate Limit → Exception      │
//! │            → Basic Auth → CORS → Body Limit)                │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Handlers (health, users/me, docs)                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Authenticator (verifier → resolver → repository)           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Cache (MemoryCache | RedisCache)                           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use front_door::{AppState, CacheBackend, Config, InMemoryUserRepository, build_router};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let cache = CacheBackend::connect(config.redis_url.as_deref()).await?;
//!     let users = Arc::new(InMemoryUserRepository::with_usernames(&config.seed_usernames));
//!
//!     let state = AppState::new(config, cache, users)?;
//!     let app = build_router(state)?;
//!
//!     // Serve with `into_make_service_with_connect_info::<SocketAddr>()`...
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! ```bash
//! JWT_SECRET_KEY=change-me RATE_LIMIT_REQUESTS=100 RATE_LIMIT_TIME_WINDOW=60 cargo run
//! ```

pub mod auth;
pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;
pub mod telemetry;
pub mod utils;

// Re-exports for convenience
pub use auth::{CurrentUser, InMemoryUserRepository, UserRepository};
pub use cache::{Cache, CacheBackend, CacheError};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use routes::{application_routes, build_router, with_pipeline};
pub use state::AppState;
