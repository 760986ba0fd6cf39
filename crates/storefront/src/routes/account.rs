//! Account settings route handlers.

use axum::{Json, extract::State, http::StatusCode};
use tracing::instrument;

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::user::{
    ChangePasswordRequest, TwoFactorSettingsRequest, UpdateProfileRequest, User,
};
use crate::services::auth::AuthService;
use crate::state::AppState;

/// GET /api/account/profile
pub async fn profile(RequireAuth(user): RequireAuth) -> Json<User> {
    Json(user)
}

/// PUT /api/account/profile
#[instrument(skip(state, user, request), fields(user_id = %user.id))]
pub async fn update_profile(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<User>> {
    let user = AuthService::new(state.pool(), state.notifier())
        .update_profile(user.id, &request)
        .await?;
    Ok(Json(user))
}

/// PUT /api/account/password
#[instrument(skip(state, user, request), fields(user_id = %user.id))]
pub async fn change_password(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<StatusCode> {
    AuthService::new(state.pool(), state.notifier())
        .change_password(user.id, &request)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/account/two-factor
#[instrument(skip(state, user, request), fields(user_id = %user.id))]
pub async fn set_two_factor(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(request): Json<TwoFactorSettingsRequest>,
) -> Result<Json<User>> {
    let user = AuthService::new(state.pool(), state.notifier())
        .set_two_factor(user.id, &request)
        .await?;
    Ok(Json(user))
}
