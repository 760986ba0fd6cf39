//! Authentication route handlers.
//!
//! Password login, with an optional second step when the user has two-factor
//! login enabled. Between the two steps the session only holds the pending
//! user ID; the user is not logged in until the code checks out.

use axum::{Json, extract::State, http::StatusCode};
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{
    RequireAuth, clear_current_user, clear_pending_two_factor, pending_two_factor,
    set_current_user, set_pending_two_factor,
};
use crate::models::user::{
    LoginRequest, LoginResponse, RegisterRequest, User, VerifyTwoFactorRequest,
};
use crate::services::auth::{AuthError, AuthService, LoginOutcome};
use crate::state::AppState;

/// POST /api/auth/register
///
/// Creates the account and logs it in.
#[instrument(skip(state, session, request))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>)> {
    let user = AuthService::new(state.pool(), state.notifier())
        .register(&request)
        .await?;

    set_current_user(&session, &user).await?;
    set_sentry_user(&user.id, Some(user.email.as_str()));
    tracing::info!(user_id = %user.id, "User registered");

    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /api/auth/login
#[instrument(skip(state, session, request))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let outcome = AuthService::new(state.pool(), state.notifier())
        .login(&request.email, &request.password)
        .await?;

    match outcome {
        LoginOutcome::Authenticated(user) => {
            set_current_user(&session, &user).await?;
            set_sentry_user(&user.id, Some(user.email.as_str()));
            tracing::info!(user_id = %user.id, "User logged in");
            Ok(Json(LoginResponse::Authenticated { user }))
        }
        LoginOutcome::TwoFactorPending(user) => {
            set_pending_two_factor(&session, user.id).await?;
            Ok(Json(LoginResponse::TwoFactorRequired {
                two_factor_required: true,
                method: user.two_factor_method,
            }))
        }
    }
}

/// POST /api/auth/verify-2fa
///
/// Second login step. Only valid after a password login that asked for a code.
#[instrument(skip(state, session, request))]
pub async fn verify_two_factor(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<VerifyTwoFactorRequest>,
) -> Result<Json<User>> {
    let user_id = pending_two_factor(&session)
        .await?
        .ok_or(AuthError::NoPendingTwoFactor)?;

    let result = AuthService::new(state.pool(), state.notifier())
        .verify_two_factor(user_id, &request.code)
        .await;

    let user = match result {
        Ok(user) => user,
        Err(e @ (AuthError::TooManyAttempts | AuthError::CodeExpired | AuthError::Blocked)) => {
            // Start over from the password step.
            clear_pending_two_factor(&session).await?;
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    set_current_user(&session, &user).await?;
    set_sentry_user(&user.id, Some(user.email.as_str()));
    tracing::info!(user_id = %user.id, "User logged in with two-factor code");

    Ok(Json(user))
}

/// POST /api/auth/logout
pub async fn logout(session: Session) -> Result<StatusCode> {
    clear_current_user(&session).await?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/auth/me
pub async fn me(RequireAuth(user): RequireAuth) -> Json<User> {
    Json(user)
}

