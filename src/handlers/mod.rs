//! HTTP handlers.
//!
//! Handlers stay thin: authentication lives in the `CurrentUser` extractor
//! and every cross-cutting concern lives in the pipeline layers.

pub mod docs;
mod health;
mod users;

pub use docs::{openapi_document, redoc, swagger_ui};
pub use health::health_check;
pub use users::current_user;
