//! Bearer authentication.
//!
//! # Resolution Chain
//!
//! ```text
//! START ──header──▶ TOKEN_EXTRACTED ──verify──▶ TOKEN_VERIFIED ──lookup──▶ PRINCIPAL_RESOLVED
//!   │                     │                          │
//!   ▼                     ▼                          ▼
//! MISSING_CREDENTIALS   TOKEN_INVALID          PRINCIPAL_NOT_FOUND
//! ```
//!
//! Each failure exit maps to a 401 with a fixed detail message and a
//! `WWW-Authenticate: Bearer` challenge. A failing user store is not a client
//! problem: it surfaces as [`RepositoryError`] and ends up in the failure
//! normalizer as a 500.
//!
//! Authentication is not a pipeline stage. Handlers opt in by taking a
//! [`CurrentUser`] argument.

mod extractor;
mod repository;
mod resolver;
mod verifier;

use std::fmt;
use std::sync::Arc;

use axum::http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::{debug, info};

pub use self::extractor::CurrentUser;
pub use self::repository::{InMemoryUserRepository, RepositoryError, UserRepository};
pub use self::resolver::PrincipalResolver;
pub use self::verifier::{CredentialVerifier, InvalidToken, Verification};
use crate::error::detail_response;
use crate::metrics;
use crate::models::User;

/// Why a request was not authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    /// No `Authorization` header, or not a Bearer credential.
    MissingCredentials,
    InvalidToken(InvalidToken),
    /// Token is valid but names an unknown user.
    PrincipalNotFound,
}

impl AuthFailure {
    /// Caller-facing detail message.
    pub fn detail(&self) -> &'static str {
        match self {
            AuthFailure::MissingCredentials => "Not authenticated",
            AuthFailure::InvalidToken(_) => "Invalid authentication credentials",
            AuthFailure::PrincipalNotFound => "User not found",
        }
    }

    /// Metric label.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthFailure::MissingCredentials => "missing_credentials",
            AuthFailure::InvalidToken(_) => "invalid_token",
            AuthFailure::PrincipalNotFound => "principal_not_found",
        }
    }
}

impl fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.detail())
    }
}

impl IntoResponse for AuthFailure {
    fn into_response(self) -> Response {
        let mut response = detail_response(StatusCode::UNAUTHORIZED, self.detail());
        response
            .headers_mut()
            .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        response
    }
}

/// Outcome of one authentication attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authentication {
    Authenticated(User),
    Unauthorized(AuthFailure),
}

/// Runs the bearer resolution chain.
#[derive(Clone)]
pub struct Authenticator {
    verifier: Arc<CredentialVerifier>,
    resolver: PrincipalResolver,
}

impl Authenticator {
    pub fn new(verifier: CredentialVerifier, repository: Arc<dyn UserRepository>) -> Self {
        Self {
            verifier: Arc::new(verifier),
            resolver: PrincipalResolver::new(repository),
        }
    }

    /// Authenticate from request headers.
    ///
    /// # Errors
    ///
    /// Only a failing user store produces `Err`; every client-side problem is
    /// an [`Authentication::Unauthorized`] value.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<Authentication, RepositoryError> {
        let Some(token) = headers.get(AUTHORIZATION).and_then(extract_bearer_token) else {
            return Ok(self.reject(AuthFailure::MissingCredentials));
        };

        let subject = match self.verifier.verify(token) {
            Verification::Subject(subject) => subject,
            Verification::Invalid(reason) => {
                debug!(reason = %reason, "Rejected bearer token");
                return Ok(self.reject(AuthFailure::InvalidToken(reason)));
            }
        };

        match self.resolver.resolve(&subject).await? {
            Some(user) => Ok(Authentication::Authenticated(user)),
            None => {
                debug!(username = %subject, "Token subject has no matching user");
                Ok(self.reject(AuthFailure::PrincipalNotFound))
            }
        }
    }

    fn reject(&self, failure: AuthFailure) -> Authentication {
        info!(reason = failure.reason(), "Authentication failed: {}", failure.detail());
        metrics::record_auth_failure(failure.reason());
        Authentication::Unauthorized(failure)
    }
}

/// Token from `Authorization: Bearer <token>`.
///
/// The scheme is matched case-insensitively; a blank token counts as absent.
pub fn extract_bearer_token(value: &HeaderValue) -> Option<&str> {
    let (scheme, token) = value.to_str().ok()?.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
