//! Authentication extractors.
//!
//! The session only stores who is logged in. [`RequireAuth`] re-reads the
//! user on every request, so blocking an account or revoking admin takes
//! effect immediately.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use mercadoboom_core::UserId;

use crate::db::UserRepository;
use crate::error::AppError;
use crate::models::session::{CurrentUser, keys};
use crate::models::user::User;
use crate::state::AppState;

/// Extractor that requires a logged-in, unblocked user.
///
/// Rejects with 401 when nobody is logged in and 403 when the account is
/// blocked.
///
/// # Example
///
/// ```rust,ignore
/// async fn me(RequireAuth(user): RequireAuth) -> Json<User> {
///     Json(user)
/// }
/// ```
pub struct RequireAuth(pub User);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .ok_or_else(|| AppError::Unauthorized("Not logged in".to_string()))?;

        let current: CurrentUser = session
            .get(keys::CURRENT_USER)
            .await
            .ok()
            .flatten()
            .ok_or_else(|| AppError::Unauthorized("Not logged in".to_string()))?;

        let Some(user) = UserRepository::new(state.pool())
            .get_by_id(current.id)
            .await?
        else {
            // Account deleted since login.
            let _ = clear_current_user(session).await;
            return Err(AppError::Unauthorized("Not logged in".to_string()));
        };

        if user.is_blocked {
            return Err(AppError::Forbidden("Account is blocked".to_string()));
        }

        Ok(Self(user))
    }
}

/// Extractor that requires a logged-in administrator.
pub struct RequireAdmin(pub User);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state).await?;

        if !user.is_admin {
            return Err(AppError::Forbidden("Admin access required".to_string()));
        }

        Ok(Self(user))
    }
}

/// Log a user in.
///
/// The session ID is cycled first so a pre-login ID can't be reused.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &User,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session
        .remove::<UserId>(keys::PENDING_TWO_FACTOR)
        .await?;
    session
        .insert(
            keys::CURRENT_USER,
            CurrentUser {
                id: user.id,
                email: user.email.clone(),
            },
        )
        .await
}

/// Log the user out and drop the whole session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}

/// Remember a user who passed the password check and owes a code.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_pending_two_factor(
    session: &Session,
    user_id: UserId,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(keys::PENDING_TWO_FACTOR, user_id).await
}

/// The user waiting for a two-factor code, if any.
///
/// # Errors
///
/// Returns an error if the session cannot be read.
pub async fn pending_two_factor(
    session: &Session,
) -> Result<Option<UserId>, tower_sessions::session::Error> {
    session.get(keys::PENDING_TWO_FACTOR).await
}

/// Forget a pending two-factor login.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_pending_two_factor(
    session: &Session,
) -> Result<(), tower_sessions::session::Error> {
    session.remove::<UserId>(keys::PENDING_TWO_FACTOR).await?;
    Ok(())
}
