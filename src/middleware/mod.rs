//! Request pipeline stages.
//!
//! Each stage is a Tower `Layer`/`Service` pair:
//!
//! - **Request ID**: correlation identifier, task-local scope and request span
//! - **Rate Limiting**: fixed-window counters in the shared cache
//! - **Exception**: turns panics and internal errors into safe 500s
//! - **Basic Auth**: credentials for the documentation pages
//!
//! # Architecture
//!
//! ```text
//! Request → Request ID → Trace → Rate Limit → Exception → Basic Auth → CORS → Handler
//!               ↓                    ↓            ↓            ↓
//!         X-Request-Id         429 / 503        500          401
//! ```
//!
//! [`crate::routes::with_pipeline`] fixes this order. A stage either answers
//! itself or delegates inward; outer stages see every response inner stages
//! produce, which is how the correlation header ends up on rejections too.

pub mod basic_auth;
pub mod exception;
pub mod ip;
pub mod rate_limit;
pub mod request_id;

pub use basic_auth::{BasicAuthLayer, BasicCredentials, PROTECTED_PATHS};
pub use exception::ExceptionLayer;
pub use ip::{UNKNOWN_IP, extract_client_ip};
pub use rate_limit::{Admission, FixedWindowLimiter, RateLimitError, RateLimitLayer};
pub use request_id::{REQUEST_ID_HEADER, RequestIdExt, RequestIdLayer};
