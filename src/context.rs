//! Per-request correlation identifier.
//!
//! The identifier lives in a Tokio task-local that is scoped around the whole
//! downstream call chain of one request, so any code executing on behalf of
//! that request can read it without threading it through arguments. Two
//! requests in flight at the same time never observe each other's value.
//!
//! ```rust,ignore
//! if let Some(id) = front_door::context::current_correlation_id() {
//!     tracing::info!(correlation_id = %id, "doing work");
//! }
//! ```
//!
//! Work spawned onto a *new* task does not inherit the scope. Wrap it with
//! [`scope`] to carry the identifier across.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use axum::http::HeaderValue;
use uuid::Uuid;

/// Longest client-supplied identifier that is accepted as-is.
pub const MAX_CORRELATION_ID_LEN: usize = 128;

tokio::task_local! {
    static CORRELATION_ID: CorrelationId;
}

/// Opaque correlation identifier for a single request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationId(Arc<str>);

impl CorrelationId {
    /// Fresh random identifier (UUIDv4, hyphenated).
    pub fn generate() -> Self {
        Self(Arc::from(Uuid::new_v4().to_string()))
    }

    /// Accept a client-supplied identifier.
    ///
    /// Returns `None` for empty values, values longer than
    /// [`MAX_CORRELATION_ID_LEN`], and anything outside visible ASCII.
    pub fn parse(value: &str) -> Option<Self> {
        let acceptable = !value.is_empty()
            && value.len() <= MAX_CORRELATION_ID_LEN
            && value.bytes().all(|b| b.is_ascii_graphic());
        acceptable.then(|| Self(Arc::from(value)))
    }

    /// [`CorrelationId::parse`] applied to a raw header value.
    pub fn from_header(value: &HeaderValue) -> Option<Self> {
        value.to_str().ok().and_then(Self::parse)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Run `fut` with `id` as the current correlation identifier.
pub async fn scope<F: Future>(id: CorrelationId, fut: F) -> F::Output {
    CORRELATION_ID.scope(id, fut).await
}

/// Correlation identifier of the request being processed, if any.
///
/// Returns `None` outside a request scope (startup, background tasks).
pub fn current_correlation_id() -> Option<CorrelationId> {
    CORRELATION_ID.try_with(Clone::clone).ok()
}
