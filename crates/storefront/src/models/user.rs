//! User domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mercadoboom_core::{Email, TwoFactorMethod, UserId};

/// A registered customer or administrator.
///
/// The password hash is never part of this type; see
/// [`crate::db::users::UserRepository::get_with_password`].
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub is_admin: bool,
    pub is_blocked: bool,
    pub two_factor_enabled: bool,
    pub two_factor_method: TwoFactorMethod,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// First and last name joined for greetings.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Registration form.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

/// Login form.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Second step of a two-factor login.
#[derive(Debug, Deserialize)]
pub struct VerifyTwoFactorRequest {
    pub code: String,
}

/// Profile fields a user may change. Absent fields are left untouched.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// `Some("")` clears the phone number.
    pub phone: Option<String>,
}

/// Password change form.
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Two-factor settings form.
#[derive(Debug, Deserialize)]
pub struct TwoFactorSettingsRequest {
    pub enabled: bool,
    #[serde(default)]
    pub method: TwoFactorMethod,
}

/// Result of a login attempt.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum LoginResponse {
    /// Logged in.
    Authenticated { user: User },
    /// Password accepted, a code was sent.
    TwoFactorRequired {
        two_factor_required: bool,
        method: TwoFactorMethod,
    },
}
