mod api;
mod user;

pub use api::{ErrorResponse, HealthResponse, UserResponse};
pub use user::User;
