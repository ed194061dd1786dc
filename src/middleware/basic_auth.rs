//! HTTP Basic authentication for the documentation pages.
//!
//! Only [`PROTECTED_PATHS`] are gated; every other request passes through
//! without inspection.
//!
//! A gated request needs `Authorization: Basic base64(username:password)`
//! matching the configured credentials. The decoded value is split at the
//! first `:`, so passwords may contain colons. Both fields are compared in
//! constant time and the two results are combined without short-circuiting,
//! so the response time does not reveal which field was wrong.
//!
//! Any failure yields `401 Unauthorized` with
//! `WWW-Authenticate: Basic realm='Swagger UI'`. If credentials are not
//! configured the pages are unreachable.

use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use axum::http::{HeaderValue, Request, Response, StatusCode};
use axum::response::IntoResponse;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use subtle::ConstantTimeEq;
use tower::{Layer, Service};
use tracing::warn;

use crate::metrics;

/// Paths that require documentation credentials.
pub const PROTECTED_PATHS: [&str; 3] = ["/docs", "/redoc", "/openapi.json"];

/// Challenge sent with every rejection.
pub const BASIC_AUTH_CHALLENGE: &str = "Basic realm='Swagger UI'";

/// Configured documentation credentials.
#[derive(Clone)]
pub struct BasicCredentials {
    username: String,
    password: String,
}

impl BasicCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Constant-time check of both fields.
    pub fn matches(&self, username: &str, password: &str) -> bool {
        let user_ok = username.as_bytes().ct_eq(self.username.as_bytes());
        let pass_ok = password.as_bytes().ct_eq(self.password.as_bytes());
        (user_ok & pass_ok).into()
    }
}

impl fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Decode `Basic <base64(user:pass)>` into its two fields.
///
/// Returns `None` on a wrong scheme, invalid base64, non-UTF-8 content or a
/// missing colon.
pub fn parse_basic_authorization(value: &str) -> Option<(String, String)> {
    let encoded = value.strip_prefix("Basic ")?.trim();
    let decoded = STANDARD.decode(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Denial {
    NotConfigured,
    MissingHeader,
    Malformed,
    Mismatch,
}

impl Denial {
    fn as_str(self) -> &'static str {
        match self {
            Denial::NotConfigured => "credentials not configured",
            Denial::MissingHeader => "missing authorization header",
            Denial::Malformed => "malformed basic credentials",
            Denial::Mismatch => "credential mismatch",
        }
    }
}

/// Basic-auth gate layer.
#[derive(Clone, Debug, Default)]
pub struct BasicAuthLayer {
    credentials: Option<Arc<BasicCredentials>>,
}

impl BasicAuthLayer {
    /// Gate using the given credentials. With `None`, the protected paths
    /// reject every request.
    pub fn new(credentials: Option<BasicCredentials>) -> Self {
        Self {
            credentials: credentials.map(Arc::new),
        }
    }

    /// Build from the optional username/password pair in configuration.
    pub fn from_parts(username: Option<&str>, password: Option<&str>) -> Self {
        match (username, password) {
            (Some(user), Some(pass)) => Self::new(Some(BasicCredentials::new(user, pass))),
            _ => Self::new(None),
        }
    }
}

impl<S> Layer<S> for BasicAuthLayer {
    type Service = BasicAuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        BasicAuthService {
            inner,
            credentials: self.credentials.clone(),
        }
    }
}

#[derive(Clone)]
pub struct BasicAuthService<S> {
    inner: S,
    credentials: Option<Arc<BasicCredentials>>,
}

impl<S> BasicAuthService<S> {
    fn check(&self, header: Option<&HeaderValue>) -> Result<(), Denial> {
        let credentials = self.credentials.as_ref().ok_or(Denial::NotConfigured)?;
        let header = header.ok_or(Denial::MissingHeader)?;
        let (username, password) = header
            .to_str()
            .ok()
            .and_then(parse_basic_authorization)
            .ok_or(Denial::Malformed)?;

        if credentials.matches(&username, &password) {
            Ok(())
        } else {
            Err(Denial::Mismatch)
        }
    }
}

impl<S> Service<Request<Body>> for BasicAuthService<S>
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

        if !PROTECTED_PATHS.contains(&req.uri().path()) {
            return Box::pin(async move { inner.call(req).await });
        }

        if let Err(denial) = self.check(req.headers().get(AUTHORIZATION)) {
            warn!(
                path = %req.uri().path(),
                reason = denial.as_str(),
                "Documentation access denied"
            );
            metrics::record_basic_auth_failure();
            return Box::pin(async { Ok(unauthorized_response()) });
        }

        Box::pin(async move { inner.call(req).await })
    }
}

fn unauthorized_response() -> Response<Body> {
    (
        StatusCode::UNAUTHORIZED,
        [(WWW_AUTHENTICATE, HeaderValue::from_static(BASIC_AUTH_CHALLENGE))],
        "Unauthorized",
    )
        .into_response()
}
