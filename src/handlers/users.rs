use axum::Json;
use tracing::instrument;

use crate::auth::CurrentUser;
use crate::models::UserResponse;

/// `GET /api/v1/users/me`: the authenticated principal.
///
/// The extractor has already rejected the request with 401 if the bearer
/// token is missing, invalid, or names an unknown user.
#[instrument(skip_all)]
pub async fn current_user(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(UserResponse::from(user))
}
