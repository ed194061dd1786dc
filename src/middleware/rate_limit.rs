//! Fixed-window rate limiting against the shared cache.
//!
//! # Algorithm
//!
//! One counter per client under `rate_limit:{client_ip}`, living for one
//! window:
//!
//! 1. Read the counter.
//! 2. Absent: store `1` with TTL = window and admit.
//! 3. At or over the limit: reject without touching the counter.
//! 4. Otherwise increment (the TTL is kept) and admit. An increment that
//!    yields `1` means the key expired after step 1, so the TTL is set again.
//!
//! The window starts at the client's first request and ends when the cache
//! expires the key; the next request opens a fresh window. A client can
//! therefore get up to twice the limit through across a window boundary.
//!
//! The read and the write are separate cache calls, so concurrent requests
//! from one client may both observe the same count and overshoot the limit
//! slightly.
//!
//! # Responses
//!
//! - Throttled: `429 {"detail": "Too many requests. Try again later."}`,
//!   logged at info. No remaining-allowance headers are sent.
//! - Cache failure: `503 {"detail": "Service temporarily unavailable."}`,
//!   logged at error. The request is rejected rather than let through.
//!
//! # Client Key
//!
//! See [`super::ip`]: socket peer by default, proxy headers when
//! `TRUST_FORWARDED_HEADERS` is set.

use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use tower::{Layer, Service};
use tracing::{debug, error, info, trace};

use super::ip::extract_client_ip;
use crate::cache::{Cache, CacheError};
use crate::error::detail_response;
use crate::metrics;

/// Cache key prefix for per-client counters.
pub const RATE_LIMIT_KEY_PREFIX: &str = "rate_limit:";

pub const THROTTLED_DETAIL: &str = "Too many requests. Try again later.";
pub const UNAVAILABLE_DETAIL: &str = "Service temporarily unavailable.";

/// Error type for rate limiter configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitError {
    ZeroLimit,
    ZeroWindow,
}

impl fmt::Display for RateLimitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimitError::ZeroLimit => {
                write!(f, "limit must be greater than 0; use disabled() for no limiting")
            }
            RateLimitError::ZeroWindow => write!(f, "window must be longer than zero"),
        }
    }
}

impl std::error::Error for RateLimitError {}

/// Whether a request may proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allow,
    Throttle,
}

/// Fixed-window counter over a [`Cache`].
#[derive(Clone)]
pub struct FixedWindowLimiter {
    cache: Arc<dyn Cache>,
    limit: i64,
    window: Duration,
}

impl FixedWindowLimiter {
    /// # Errors
    ///
    /// Returns `RateLimitError` if `limit` is zero or `window` is empty.
    pub fn new(cache: Arc<dyn Cache>, limit: u32, window: Duration) -> Result<Self, RateLimitError> {
        if limit == 0 {
            return Err(RateLimitError::ZeroLimit);
        }
        if window.is_zero() {
            return Err(RateLimitError::ZeroWindow);
        }

        Ok(Self {
            cache,
            limit: i64::from(limit),
            window,
        })
    }

    /// Count one request from `client_key` and decide whether to admit it.
    ///
    /// # Errors
    ///
    /// Propagates cache failures; the caller decides how to fail.
    pub async fn admit(&self, client_key: &str) -> Result<Admission, CacheError> {
        let key = format!("{RATE_LIMIT_KEY_PREFIX}{client_key}");

        match self.cache.get(&key).await? {
            None => {
                self.cache.set(&key, 1, self.window).await?;
                trace!(client_ip = %client_key, "Opened rate limit window");
                Ok(Admission::Allow)
            }
            Some(count) if count >= self.limit => {
                info!(
                    client_ip = %client_key,
                    count,
                    limit = self.limit,
                    "Rate limit exceeded"
                );
                Ok(Admission::Throttle)
            }
            Some(_) => {
                let count = self.cache.increment(&key).await?;
                if count == 1 {
                    // The window ended between get and increment; the store
                    // recreated the counter without an expiry
                    self.cache.set(&key, 1, self.window).await?;
                    trace!(client_ip = %client_key, "Reopened expired rate limit window");
                } else {
                    trace!(client_ip = %client_key, count, "Request counted");
                }
                Ok(Admission::Allow)
            }
        }
    }
}

/// Rate limiting layer for the Tower middleware stack.
///
/// A disabled layer passes every request through untouched.
///
/// # Example
///
/// ```rust,ignore
/// let layer = RateLimitLayer::new(cache, 100, Duration::from_secs(60), false)?;
/// let app = Router::new()
///     .route("/api", get(handler))
///     .layer(layer);
/// ```
#[derive(Clone)]
pub struct RateLimitLayer {
    limiter: Option<FixedWindowLimiter>,
    trust_forwarded_headers: bool,
}

impl RateLimitLayer {
    /// # Errors
    ///
    /// Returns `RateLimitError` if `limit` is zero or `window` is empty.
    pub fn new(
        cache: Arc<dyn Cache>,
        limit: u32,
        window: Duration,
        trust_forwarded_headers: bool,
    ) -> Result<Self, RateLimitError> {
        Ok(Self {
            limiter: Some(FixedWindowLimiter::new(cache, limit, window)?),
            trust_forwarded_headers,
        })
    }

    /// Layer that admits everything.
    pub fn disabled() -> Self {
        Self {
            limiter: None,
            trust_forwarded_headers: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.limiter.is_some()
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            limiter: self.limiter.clone(),
            trust_forwarded_headers: self.trust_forwarded_headers,
        }
    }
}

/// Rate limiting service wrapper.
#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    limiter: Option<FixedWindowLimiter>,
    trust_forwarded_headers: bool,
}

impl<S> Service<Request<Body>> for RateLimitService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();

        let Some(limiter) = self.limiter.clone() else {
            return Box::pin(async move { inner.call(req).await });
        };

        let client_ip = extract_client_ip(&req, self.trust_forwarded_headers).into_owned();

        Box::pin(async move {
            match limiter.admit(&client_ip).await {
                Ok(Admission::Allow) => inner.call(req).await,
                Ok(Admission::Throttle) => {
                    debug!(path = %req.uri().path(), "Rejecting throttled request");
                    metrics::record_throttled();
                    Ok(detail_response(StatusCode::TOO_MANY_REQUESTS, THROTTLED_DETAIL))
                }
                Err(e) => {
                    error!(
                        client_ip = %client_ip,
                        error = %e,
                        "Rate limit cache unavailable, rejecting request"
                    );
                    metrics::record_cache_error();
                    Ok(detail_response(
                        StatusCode::SERVICE_UNAVAILABLE,
                        UNAVAILABLE_DETAIL,
                    ))
                }
            }
        })
    }
}
