//! Failure normalization.
//!
//! Wraps everything downstream and turns any unhandled failure into a 500
//! with a JSON `detail`:
//!
//! - a panic while running the downstream future,
//! - an `Err` from the downstream service,
//! - a response tagged with [`UnhandledFailure`] (internal [`AppError`]s).
//!
//! The full failure is always logged at error level. The caller only sees
//! the literal message when `APP_DEBUG` is on; otherwise the detail is
//! [`GENERIC_FAILURE_DETAIL`].
//!
//! Panics only reach this layer when the binary is built with
//! `panic = "unwind"`.
//!
//! [`AppError`]: crate::error::AppError

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use futures_util::FutureExt;
use tower::{Layer, Service};
use tracing::error;

use crate::error::{GENERIC_FAILURE_DETAIL, UnhandledFailure, detail_response};
use crate::metrics;

/// Failure normalization layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExceptionLayer {
    debug: bool,
}

impl ExceptionLayer {
    /// `debug` exposes failure messages to callers.
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }
}

impl<S> Layer<S> for ExceptionLayer {
    type Service = ExceptionService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ExceptionService {
            inner,
            debug: self.debug,
        }
    }
}

#[derive(Clone)]
pub struct ExceptionService<S> {
    inner: S,
    debug: bool,
}

impl<S> Service<Request<Body>> for ExceptionService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: fmt::Display + fmt::Debug + Send,
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
        let debug = self.debug;
        let mut inner = self.inner.clone();

        Box::pin(async move {
            // call() itself sits inside the guarded future so synchronous panics are caught too
            let outcome = AssertUnwindSafe(async move { inner.call(req).await })
                .catch_unwind()
                .await;

            let message = match outcome {
                Ok(Ok(response)) => match response.extensions().get::<UnhandledFailure>() {
                    Some(failure) => {
                        error!(
                            error = %failure.message,
                            diagnostic = %failure.diagnostic,
                            "Unhandled application error"
                        );
                        metrics::record_unhandled_failure("error");
                        failure.message.clone()
                    }
                    None => return Ok(response),
                },
                Ok(Err(e)) => {
                    error!(error = %e, diagnostic = ?e, "Unhandled service error");
                    metrics::record_unhandled_failure("service");
                    e.to_string()
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    error!(panic = %message, "Request handler panicked");
                    metrics::record_unhandled_failure("panic");
                    message
                }
            };

            Ok(failure_response(debug, &message))
        })
    }
}

/// The 500 response for an unhandled failure.
pub fn failure_response(debug: bool, message: &str) -> Response<Body> {
    let detail = if debug { message } else { GENERIC_FAILURE_DETAIL };
    detail_response(StatusCode::INTERNAL_SERVER_ERROR, detail)
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
