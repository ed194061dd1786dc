//! Application configuration loaded from environment variables.
//!
//! # Configuration Hierarchy
//!
//! Everything is read from the process environment, optionally seeded from a
//! `.env` file. Only `JWT_SECRET_KEY` is mandatory; every other setting has a
//! development default.
//!
//! # Security Configuration
//!
//! - `JWT_SECRET_KEY` / `JWT_ALGORITHM`: HMAC key and algorithm for bearer tokens
//! - `SWAGGER_USERNAME` / `SWAGGER_PASSWORD`: credentials for the documentation
//!   pages. When either is unset the pages reject every request.
//! - `TRUST_FORWARDED_HEADERS`: key the rate limiter on `X-Forwarded-For` /
//!   `X-Real-IP` instead of the socket peer (only behind a trusted proxy)
//! - `CORS_ALLOWED_ORIGINS`: comma-separated list (default: `*`)
//!
//! # Rate Limiting
//!
//! - `RATE_LIMIT_REQUESTS`: requests admitted per client per window (default: 100, 0 = off)
//! - `RATE_LIMIT_TIME_WINDOW`: window length in seconds (default: 60)
//! - `REDIS_URL`: share counters through Redis instead of process memory
//!
//! Logging (`RUST_LOG`, `LOG_FORMAT`) is configured by [`crate::telemetry`]
//! before this module runs, so that configuration errors are logged.

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use jsonwebtoken::Algorithm;

use crate::error::{AppError, AppResult};

/// Application configuration loaded from environment variables.
///
/// # Example
///
/// ```rust,ignore
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.server_addr());
/// ```
#[derive(Clone)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Server host address (default: "0.0.0.0")
    pub host: String,

    /// Server port (default: 8000)
    pub port: u16,

    /// Expose literal failure messages in 500 responses (default: false)
    pub app_debug: bool,

    /// Maximum request body size in bytes (default: 1MB)
    pub max_request_body_size: usize,

    // =========================================================================
    // Rate Limiting Configuration
    // =========================================================================
    /// Requests admitted per client per window (default: 100, 0 = disabled)
    pub rate_limit_requests: u32,

    /// Fixed window length (default: 60 seconds)
    pub rate_limit_time_window: Duration,

    /// Key clients by proxy headers instead of the peer address (default: false)
    pub trust_forwarded_headers: bool,

    // =========================================================================
    // Cache Configuration
    // =========================================================================
    /// Redis connection URL; in-process cache when unset
    pub redis_url: Option<String>,

    /// How often expired entries are swept from the in-process cache (default: 60s)
    pub cache_sweep_interval: Duration,

    // =========================================================================
    // Security Configuration
    // =========================================================================
    /// HMAC secret for bearer tokens (required)
    pub jwt_secret_key: String,

    /// Token signing algorithm (default: HS256)
    pub jwt_algorithm: Algorithm,

    /// Documentation username
    pub swagger_username: Option<String>,

    /// Documentation password
    pub swagger_password: Option<String>,

    /// Allowed CORS origins; "*" allows all
    pub cors_allowed_origins: Vec<String>,

    // =========================================================================
    // User Directory
    // =========================================================================
    /// Usernames loaded into the in-memory user repository at startup
    pub seed_usernames: Vec<String>,

    // =========================================================================
    // Observability Configuration
    // =========================================================================
    /// Port for Prometheus metrics endpoint (default: 9090, 0 = disabled)
    pub metrics_port: u16,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if `JWT_SECRET_KEY` is missing or any
    /// value fails to parse or validate.
    pub fn from_env() -> AppResult<Self> {
        // Load an .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let config = Self {
            // Server
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: Self::parse_env("PORT", 8000)?,
            app_debug: Self::parse_env("APP_DEBUG", false)?,
            max_request_body_size: Self::parse_env("MAX_REQUEST_BODY_SIZE", 1024 * 1024)?,

            // Rate limiting
            rate_limit_requests: Self::parse_env("RATE_LIMIT_REQUESTS", 100)?,
            rate_limit_time_window: Duration::from_secs(Self::parse_env(
                "RATE_LIMIT_TIME_WINDOW",
                60,
            )?),
            trust_forwarded_headers: Self::parse_env("TRUST_FORWARDED_HEADERS", false)?,

            // Cache
            redis_url: Self::optional_env("REDIS_URL"),
            cache_sweep_interval: Duration::from_secs(Self::parse_env(
                "CACHE_SWEEP_INTERVAL_SECS",
                60,
            )?),

            // Security
            jwt_secret_key: Self::optional_env("JWT_SECRET_KEY").ok_or_else(|| {
                AppError::ConfigError("JWT_SECRET_KEY must be set".to_string())
            })?,
            jwt_algorithm: Self::parse_env("JWT_ALGORITHM", Algorithm::HS256)?,
            swagger_username: Self::optional_env("SWAGGER_USERNAME"),
            swagger_password: Self::optional_env("SWAGGER_PASSWORD"),
            cors_allowed_origins: Self::parse_list("CORS_ALLOWED_ORIGINS", "*"),

            // Users
            seed_usernames: Self::parse_list("SEED_USERNAMES", ""),

            // Observability
            metrics_port: Self::parse_env("METRICS_PORT", 9090)?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values for consistency and correctness.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if validation fails.
    pub fn validate(&self) -> AppResult<()> {
        if self.rate_limit_time_window.is_zero() {
            return Err(AppError::ConfigError(
                "RATE_LIMIT_TIME_WINDOW must be greater than 0".to_string(),
            ));
        }

        if self.cache_sweep_interval.is_zero() {
            return Err(AppError::ConfigError(
                "CACHE_SWEEP_INTERVAL_SECS must be greater than 0".to_string(),
            ));
        }

        if self.max_request_body_size == 0 {
            return Err(AppError::ConfigError(
                "MAX_REQUEST_BODY_SIZE must be greater than 0".to_string(),
            ));
        }

        if self.jwt_secret_key.trim().is_empty() {
            return Err(AppError::ConfigError(
                "JWT_SECRET_KEY must not be blank".to_string(),
            ));
        }

        if !matches!(
            self.jwt_algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return Err(AppError::ConfigError(format!(
                "JWT_ALGORITHM must be HS256, HS384 or HS512 (got {:?})",
                self.jwt_algorithm
            )));
        }

        Ok(())
    }

    /// Get the full server address for binding.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn rate_limiting_enabled(&self) -> bool {
        self.rate_limit_requests > 0
    }

    /// Both documentation credentials are configured.
    pub fn docs_credentials_configured(&self) -> bool {
        self.swagger_username.is_some() && self.swagger_password.is_some()
    }

    pub fn metrics_enabled(&self) -> bool {
        self.metrics_port > 0
    }

    /// Get the metrics endpoint address.
    ///
    /// Returns `None` if metrics are disabled (port = 0).
    pub fn metrics_addr(&self) -> Option<std::net::SocketAddr> {
        self.metrics_enabled()
            .then(|| std::net::SocketAddr::from(([0, 0, 0, 0], self.metrics_port)))
    }

    /// Parse an environment variable into the specified type with a default value.
    fn parse_env<T>(name: &str, default: T) -> AppResult<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match env::var(name) {
            Ok(val) => val
                .trim()
                .parse()
                .map_err(|e| AppError::ConfigError(format!("Invalid {name}: {e}"))),
            Err(_) => Ok(default),
        }
    }

    /// Read a variable, treating empty values as unset.
    fn optional_env(name: &str) -> Option<String> {
        env::var(name).ok().filter(|v| !v.trim().is_empty())
    }

    /// Parse a comma-separated list, dropping blank entries.
    fn parse_list(name: &str, default: &str) -> Vec<String> {
        env::var(name)
            .unwrap_or_else(|_| default.to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("app_debug", &self.app_debug)
            .field("max_request_body_size", &self.max_request_body_size)
            .field("rate_limit_requests", &self.rate_limit_requests)
            .field("rate_limit_time_window", &self.rate_limit_time_window)
            .field("trust_forwarded_headers", &self.trust_forwarded_headers)
            .field("redis_url", &self.redis_url.as_ref().map(|_| "<redacted>"))
            .field("cache_sweep_interval", &self.cache_sweep_interval)
            .field("jwt_secret_key", &"<redacted>")
            .field("jwt_algorithm", &self.jwt_algorithm)
            .field("swagger_username", &self.swagger_username)
            .field(
                "swagger_password",
                &self.swagger_password.as_ref().map(|_| "<redacted>"),
            )
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("seed_usernames", &self.seed_usernames)
            .field("metrics_port", &self.metrics_port)
            .finish()
    }
}

/// Default configuration for testing and development.
///
/// Production deployments should use `Config::from_env()` instead.
impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            app_debug: false,
            max_request_body_size: 1024 * 1024,
            rate_limit_requests: 100,
            rate_limit_time_window: Duration::from_secs(60),
            trust_forwarded_headers: false,
            redis_url: None,
            cache_sweep_interval: Duration::from_secs(60),
            jwt_secret_key: "development-secret".to_string(),
            jwt_algorithm: Algorithm::HS256,
            swagger_username: None,
            swagger_password: None,
            cors_allowed_origins: vec!["*".to_string()],
            seed_usernames: vec![],
            metrics_port: 0,
        }
    }
}
