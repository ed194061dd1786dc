//! Correlation ID middleware.
//!
//! # Behavior
//!
//! For every request the layer:
//! 1. Reuses the client's `X-Request-Id` if it is acceptable (see
//!    [`CorrelationId::parse`]), otherwise generates a UUIDv4
//! 2. Writes the chosen value back into the request headers and extensions
//! 3. Scopes the rest of the pipeline inside the task-local context and a
//!    `request` tracing span carrying `request_id`, `method` and `path`
//! 4. Sets `X-Request-Id` on the response, whatever produced it
//!
//! Because the scope wraps the whole downstream call, every log line emitted
//! while handling the request (including those from the rate limiter and
//! failure normalizer) is tagged with the same identifier.
//!
//! # Client Usage
//!
//! ```bash
//! curl -H "X-Request-Id: my-correlation-id" http://localhost:8000/health
//! ```

use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::header::HeaderValue;
use axum::http::{Request, Response};
use tower::{Layer, Service};
use tracing::{Instrument, debug, info_span};

use crate::context::{self, CorrelationId};

/// Header name for the correlation ID.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

static UNKNOWN_REQUEST_ID: HeaderValue = HeaderValue::from_static("unknown");

/// Correlation ID layer for the Tower middleware stack.
#[derive(Clone, Default)]
pub struct RequestIdLayer;

impl RequestIdLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for RequestIdLayer {
    type Service = RequestIdService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestIdService { inner }
    }
}

/// Correlation ID service wrapper.
#[derive(Clone)]
pub struct RequestIdService<S> {
    inner: S,
}

// Generic over the response body: the trace layer directly inside wraps it
impl<S, ResBody> Service<Request<Body>> for RequestIdService<S>
where
    S: Service<Request<Body>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let correlation_id = extract_or_generate_correlation_id(&req);

        // Accepted ids are visible ASCII, so this only falls back if that invariant breaks
        let header_value = HeaderValue::from_str(correlation_id.as_str())
            .unwrap_or_else(|_| UNKNOWN_REQUEST_ID.clone());
        req.headers_mut()
            .insert(REQUEST_ID_HEADER, header_value.clone());
        req.extensions_mut().insert(correlation_id.clone());

        let span = info_span!(
            "request",
            request_id = %correlation_id,
            method = %req.method(),
            path = %req.uri().path(),
        );

        let mut inner = self.inner.clone();

        Box::pin(context::scope(
            correlation_id,
            async move {
                debug!("Processing request");
                let mut response = inner.call(req).await?;
                response
                    .headers_mut()
                    .insert(REQUEST_ID_HEADER, header_value);
                Ok(response)
            }
            .instrument(span),
        ))
    }
}

fn extract_or_generate_correlation_id<B>(req: &Request<B>) -> CorrelationId {
    req.headers()
        .get(REQUEST_ID_HEADER)
        .and_then(CorrelationId::from_header)
        .unwrap_or_else(CorrelationId::generate)
}

/// Extension trait to read the correlation ID the layer attached to a request.
pub trait RequestIdExt {
    fn correlation_id(&self) -> Option<&CorrelationId>;
}

impl<B> RequestIdExt for Request<B> {
    fn correlation_id(&self) -> Option<&CorrelationId> {
        self.extensions().get::<CorrelationId>()
    }
}
