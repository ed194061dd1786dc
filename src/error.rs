use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::auth::{AuthFailure, RepositoryError};
use crate::cache::CacheError;
use crate::models::ErrorResponse;

/// Detail returned to callers for any failure they must not see in full.
pub const GENERIC_FAILURE_DETAIL: &str = "Internal server error.";

/// Application-wide error types with appropriate HTTP status codes.
///
/// # Client vs. Internal Errors
///
/// `Unauthorized`, `BadRequest` and `NotFound` are caller-facing and render
/// their own detail. Every other variant renders the generic 500 body and
/// tags the response with [`UnhandledFailure`], which the failure normalizer
/// picks up to log the full message and decide whether debug mode may expose it.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Unauthorized(AuthFailure),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Cache operation failed: {0}")]
    Cache(#[from] CacheError),

    #[error("User lookup failed: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Response extension carrying an internal failure to the normalizer.
///
/// Never serialized. `message` is what debug mode shows the caller;
/// `diagnostic` is the `Debug` form, including wrapped causes, for the log.
#[derive(Debug, Clone)]
pub struct UnhandledFailure {
    pub message: String,
    pub diagnostic: String,
}

impl AppError {
    /// The failure text itself, without the variant's prefix.
    pub fn failure_message(&self) -> String {
        match self {
            AppError::Unauthorized(failure) => failure.detail().to_string(),
            AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::Internal(msg)
            | AppError::ConfigError(msg) => msg.clone(),
            AppError::Cache(e) => e.to_string(),
            AppError::Repository(e) => e.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Unauthorized(failure) => failure.into_response(),
            AppError::BadRequest(msg) => {
                tracing::debug!(detail = %msg, "Rejecting bad request");
                detail_response(StatusCode::BAD_REQUEST, msg)
            }
            AppError::NotFound(msg) => detail_response(StatusCode::NOT_FOUND, msg),
            internal => {
                let mut response =
                    detail_response(StatusCode::INTERNAL_SERVER_ERROR, GENERIC_FAILURE_DETAIL);
                response.extensions_mut().insert(UnhandledFailure {
                    message: internal.failure_message(),
                    diagnostic: format!("{internal:?}"),
                });
                response
            }
        }
    }
}

/// Build a JSON response of the form `{"detail": "..."}`.
pub fn detail_response(status: StatusCode, detail: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            detail: detail.into(),
        }),
    )
        .into_response()
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
