use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use super::Authentication;
use crate::error::AppError;
use crate::models::User;
use crate::state::AppState;

/// The authenticated caller of a handler.
///
/// Taking `CurrentUser` as a handler argument makes the route require a valid
/// bearer token for an existing user:
///
/// ```rust,ignore
/// async fn me(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
///     Json(user.into())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match state.authenticator.authenticate(&parts.headers).await? {
            Authentication::Authenticated(user) => Ok(CurrentUser(user)),
            Authentication::Unauthorized(failure) => Err(AppError::Unauthorized(failure)),
        }
    }
}
