//! Admin customer management.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use tracing::{info, instrument};

use mercadoboom_core::UserId;

use crate::db::UserRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::catalog::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::models::user::User;
use crate::state::AppState;

/// User listing query.
#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    /// Matches email, first or last name.
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Block/unblock body.
#[derive(Debug, Deserialize)]
pub struct SetBlockedRequest {
    pub blocked: bool,
}

/// Grant/revoke admin body.
#[derive(Debug, Deserialize)]
pub struct SetAdminRequest {
    pub is_admin: bool,
}

/// Admins can't lock themselves out.
fn ensure_not_self(admin: &User, target: UserId, action: &str) -> Result<()> {
    if admin.id == target {
        return Err(AppError::BadRequest(format!("you cannot {action} yourself")));
    }
    Ok(())
}

/// GET /api/admin/users
#[instrument(skip(state, _admin))]
pub async fn index(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Vec<User>>> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0).max(0);

    let users = UserRepository::new(state.pool())
        .list(query.search.as_deref(), limit, offset)
        .await?;
    Ok(Json(users))
}

/// PUT /api/admin/users/{id}/blocked
///
/// Takes effect on the user's next request.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn set_blocked(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Json(request): Json<SetBlockedRequest>,
) -> Result<Json<User>> {
    if request.blocked {
        ensure_not_self(&admin, id, "block")?;
    }
    let user = UserRepository::new(state.pool())
        .set_blocked(id, request.blocked)
        .await?;
    info!(user_id = %id, blocked = request.blocked, "User block changed");
    Ok(Json(user))
}

/// PUT /api/admin/users/{id}/admin
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn set_admin(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Json(request): Json<SetAdminRequest>,
) -> Result<Json<User>> {
    if !request.is_admin {
        ensure_not_self(&admin, id, "revoke admin from")?;
    }
    let user = UserRepository::new(state.pool())
        .set_admin(id, request.is_admin)
        .await?;
    info!(user_id = %id, is_admin = request.is_admin, "Admin role changed");
    Ok(Json(user))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use mercadoboom_core::{Email, TwoFactorMethod};

    use super::*;

    fn admin() -> User {
        let now = Utc::now();
        User {
            id: UserId::new(1),
            email: Email::parse("admin@mercadoboom.com.ar").unwrap(),
            first_name: "Admin".to_string(),
            last_name: "Boom".to_string(),
            phone: None,
            is_admin: true,
            is_blocked: false,
            two_factor_enabled: false,
            two_factor_method: TwoFactorMethod::Email,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_admin_cannot_target_self() {
        let err = ensure_not_self(&admin(), UserId::new(1), "block").unwrap_err();
        assert_eq!(err.to_string(), "Bad request: you cannot block yourself");
    }

    #[test]
    fn test_admin_can_target_others() {
        assert!(ensure_not_self(&admin(), UserId::new(2), "block").is_ok());
    }
}
