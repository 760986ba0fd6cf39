//! Authentication service.
//!
//! Password login with optional two-factor verification. Codes are six
//! digits, stored as SHA-256 hashes, valid for [`CODE_TTL_MINUTES`] and
//! checked at most [`MAX_CODE_ATTEMPTS`] times. Each check claims its attempt
//! in the database before comparing.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{Duration, Utc};
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use mercadoboom_core::{Email, TwoFactorMethod, UserId};

use super::constant_time_eq;
use super::notifications::Notifier;
use crate::db::RepositoryError;
use crate::db::two_factor::TwoFactorRepository;
use crate::db::users::{NewUser, ProfileUpdate, UserRepository};
use crate::models::user::{
    ChangePasswordRequest, RegisterRequest, TwoFactorSettingsRequest, UpdateProfileRequest, User,
};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Lifetime of a two-factor code.
pub const CODE_TTL_MINUTES: i64 = 10;

/// Checks allowed per two-factor code.
pub const MAX_CODE_ATTEMPTS: i32 = 5;

/// Result of the password step of a login.
#[derive(Debug)]
pub enum LoginOutcome {
    /// Logged in.
    Authenticated(User),
    /// A code was sent; the login completes in [`AuthService::verify_two_factor`].
    TwoFactorPending(User),
}

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
    codes: TwoFactorRepository<'a>,
    notifier: &'a Notifier,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, notifier: &'a Notifier) -> Self {
        Self {
            users: UserRepository::new(pool),
            codes: TwoFactorRepository::new(pool),
            notifier,
        }
    }

    // =========================================================================
    // Registration and login
    // =========================================================================

    /// Register a new customer.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    pub async fn register(&self, request: &RegisterRequest) -> Result<User, AuthError> {
        let email = Email::parse(&request.email)?;
        validate_password(&request.password)?;
        let first_name = required(&request.first_name, "first_name")?;
        let last_name = required(&request.last_name, "last_name")?;
        let phone = request
            .phone
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty());

        let password_hash = hash_password(&request.password)?;

        self.create_user(&NewUser {
            email: &email,
            password_hash: &password_hash,
            first_name,
            last_name,
            phone,
            is_admin: false,
        })
        .await
    }

    /// Create an administrator account (used by the CLI).
    ///
    /// # Errors
    ///
    /// Same as [`Self::register`].
    pub async fn create_admin(
        &self,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<User, AuthError> {
        let email = Email::parse(email)?;
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        self.create_user(&NewUser {
            email: &email,
            password_hash: &password_hash,
            first_name: required(first_name, "first_name")?,
            last_name: required(last_name, "last_name")?,
            phone: None,
            is_admin: true,
        })
        .await
    }

    async fn create_user(&self, new: &NewUser<'_>) -> Result<User, AuthError> {
        self.users.create(new).await.map_err(|e| match e {
            RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
            other => AuthError::Repository(other),
        })
    }

    /// Check email and password. When two-factor login is enabled a code is
    /// generated, stored and delivered.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    /// Returns `AuthError::Blocked` if the account is blocked.
    /// Returns `AuthError::Delivery` if the code cannot be sent.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = self
            .users
            .get_with_password(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        if user.is_blocked {
            return Err(AuthError::Blocked);
        }

        if !user.two_factor_enabled {
            return Ok(LoginOutcome::Authenticated(user));
        }

        self.issue_code(&user).await?;
        Ok(LoginOutcome::TwoFactorPending(user))
    }

    /// Generate, store and deliver a fresh two-factor code.
    async fn issue_code(&self, user: &User) -> Result<(), AuthError> {
        let code = generate_code();
        let expires_at = Utc::now() + Duration::minutes(CODE_TTL_MINUTES);
        self.codes
            .create(user.id, &hash_code(user.id, &code), expires_at)
            .await?;

        self.notifier
            .send_two_factor_code(user, user.two_factor_method, &code, CODE_TTL_MINUTES)
            .await
            .map_err(|e| {
                tracing::error!(user_id = %user.id, error = %e, "Two-factor code delivery failed");
                AuthError::Delivery(e.to_string())
            })?;

        tracing::info!(user_id = %user.id, method = %user.two_factor_method, "Two-factor code sent");
        Ok(())
    }

    /// Finish a two-factor login.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCode` for a wrong or missing code,
    /// `AuthError::CodeExpired` past its expiry and
    /// `AuthError::TooManyAttempts` once the attempt budget is spent.
    pub async fn verify_two_factor(&self, user_id: UserId, code: &str) -> Result<User, AuthError> {
        let stored = self
            .codes
            .latest_unused(user_id)
            .await?
            .ok_or(AuthError::InvalidCode)?;

        if stored.expires_at <= Utc::now() {
            return Err(AuthError::CodeExpired);
        }
        let attempts = self
            .codes
            .claim_attempt(stored.id, MAX_CODE_ATTEMPTS)
            .await?
            .ok_or(AuthError::TooManyAttempts)?;

        let candidate = hash_code(user_id, code.trim());
        if !constant_time_eq(candidate.as_bytes(), stored.code_hash.as_bytes()) {
            tracing::warn!(user_id = %user_id, attempts, "Wrong two-factor code");
            return Err(attempt_error(attempts));
        }

        if !self.codes.mark_used(stored.id).await? {
            return Err(AuthError::InvalidCode);
        }

        let user = self.get_user(user_id).await?;
        if user.is_blocked {
            return Err(AuthError::Blocked);
        }
        Ok(user)
    }

    // =========================================================================
    // Account management
    // =========================================================================

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the user doesn't exist.
    pub async fn get_user(&self, user_id: UserId) -> Result<User, AuthError> {
        self.users
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// Update name and phone.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidInput` for a blank name.
    pub async fn update_profile(
        &self,
        user_id: UserId,
        request: &UpdateProfileRequest,
    ) -> Result<User, AuthError> {
        let first_name = request
            .first_name
            .as_deref()
            .map(|n| required(n, "first_name").map(str::to_string))
            .transpose()?;
        let last_name = request
            .last_name
            .as_deref()
            .map(|n| required(n, "last_name").map(str::to_string))
            .transpose()?;
        let phone = request.phone.as_deref().map(|p| {
            let p = p.trim();
            (!p.is_empty()).then(|| p.to_string())
        });

        let current = self.get_user(user_id).await?;
        if current.two_factor_enabled
            && current.two_factor_method == TwoFactorMethod::Sms
            && phone == Some(None)
        {
            return Err(AuthError::PhoneRequired);
        }

        let update = ProfileUpdate {
            first_name,
            last_name,
            phone,
        };
        self.users
            .update_profile(user_id, &update)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AuthError::UserNotFound,
                other => AuthError::Repository(other),
            })
    }

    /// Change the password after checking the current one.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the current password is wrong.
    /// Returns `AuthError::WeakPassword` if the new one is too short.
    pub async fn change_password(
        &self,
        user_id: UserId,
        request: &ChangePasswordRequest,
    ) -> Result<(), AuthError> {
        let current_hash = self
            .users
            .get_password_hash(user_id)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AuthError::UserNotFound,
                other => AuthError::Repository(other),
            })?;
        verify_password(&request.current_password, &current_hash)?;
        validate_password(&request.new_password)?;

        let new_hash = hash_password(&request.new_password)?;
        self.users.update_password(user_id, &new_hash).await?;
        tracing::info!(user_id = %user_id, "Password changed");
        Ok(())
    }

    /// Enable or disable two-factor login.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MethodUnavailable` when enabling a channel the
    /// server can't deliver on, and `AuthError::PhoneRequired` when enabling
    /// SMS without a phone.
    pub async fn set_two_factor(
        &self,
        user_id: UserId,
        request: &TwoFactorSettingsRequest,
    ) -> Result<User, AuthError> {
        if request.enabled && !self.notifier.can_deliver(request.method) {
            return Err(AuthError::MethodUnavailable(request.method));
        }

        let user = self.get_user(user_id).await?;
        if request.enabled
            && request.method == TwoFactorMethod::Sms
            && user.phone.as_deref().is_none_or(|p| p.trim().is_empty())
        {
            return Err(AuthError::PhoneRequired);
        }

        let user = self
            .users
            .set_two_factor(user_id, request.enabled, request.method)
            .await?;
        tracing::info!(
            user_id = %user_id,
            enabled = request.enabled,
            method = %request.method,
            "Two-factor settings changed"
        );
        Ok(user)
    }
}

/// Error for a wrong guess, given the attempts spent so far.
fn attempt_error(attempts: i32) -> AuthError {
    if attempts >= MAX_CODE_ATTEMPTS {
        AuthError::TooManyAttempts
    } else {
        AuthError::InvalidCode
    }
}

fn required<'s>(value: &'s str, field: &str) -> Result<&'s str, AuthError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AuthError::InvalidInput(format!("{field} is required")));
    }
    Ok(trimmed)
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

/// Generate a 6-digit verification code.
#[must_use]
pub fn generate_code() -> String {
    use rand::Rng;
    let code: u32 = rand::rng().random_range(100_000..1_000_000);
    code.to_string()
}

/// Hash of a code bound to its user, so a code row is useless for anyone else.
fn hash_code(user_id: UserId, code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_i32().to_be_bytes());
    hasher.update(b":");
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_password_length() {
        assert!(matches!(
            validate_password("short"),
            Err(AuthError::WeakPassword(_))
        ));
        assert!(validate_password("long enough").is_ok());
        // Counted in characters, not bytes.
        assert!(validate_password("ñññññññ").is_err());
    }

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_verify_password_rejects_garbage_hash() {
        assert!(matches!(
            verify_password("anything", "not-a-hash"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_generate_code_format() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_hash_code_is_bound_to_user() {
        let a = hash_code(UserId::new(1), "123456");
        assert_eq!(a, hash_code(UserId::new(1), "123456"));
        assert_ne!(a, hash_code(UserId::new(2), "123456"));
        assert_ne!(a, hash_code(UserId::new(1), "654321"));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_attempt_error_after_budget() {
        assert!(matches!(attempt_error(1), AuthError::InvalidCode));
        assert!(matches!(
            attempt_error(MAX_CODE_ATTEMPTS - 1),
            AuthError::InvalidCode
        ));
        assert!(matches!(
            attempt_error(MAX_CODE_ATTEMPTS),
            AuthError::TooManyAttempts
        ));
    }

    #[tokio::test]
    async fn test_set_two_factor_requires_a_delivery_channel() {
        // Rejected before any query, so the pool never connects.
        let pool = PgPool::connect_lazy("postgres://localhost/mercadoboom_test").unwrap();
        let notifier = Notifier::new(None, None, "http://localhost:5173".to_string());
        let service = AuthService::new(&pool, &notifier);

        for method in [TwoFactorMethod::Email, TwoFactorMethod::Sms] {
            let result = service
                .set_two_factor(
                    UserId::new(1),
                    &TwoFactorSettingsRequest {
                        enabled: true,
                        method,
                    },
                )
                .await;
            assert!(
                matches!(result, Err(AuthError::MethodUnavailable(m)) if m == method),
                "{method}"
            );
        }
    }

    #[test]
    fn test_required_trims() {
        assert_eq!(required("  Ana ", "first_name").unwrap(), "Ana");
        assert!(matches!(
            required("   ", "first_name"),
            Err(AuthError::InvalidInput(_))
        ));
    }
}
