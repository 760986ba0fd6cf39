//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] mercadoboom_core::EmailError),

    /// Invalid credentials (wrong password or user not found).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// User not found.
    #[error("user not found")]
    UserNotFound,

    /// User already exists.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Password too weak or invalid.
    #[error("{0}")]
    WeakPassword(String),

    /// The account was blocked by an administrator.
    #[error("this account has been blocked")]
    Blocked,

    /// Two-factor code doesn't match.
    #[error("invalid verification code")]
    InvalidCode,

    /// Two-factor code is past its expiry.
    #[error("verification code has expired, please log in again")]
    CodeExpired,

    /// Too many wrong codes for the current login.
    #[error("too many attempts, please log in again")]
    TooManyAttempts,

    /// `verify` called without a pending login in the session.
    #[error("no two-factor login in progress")]
    NoPendingTwoFactor,

    /// SMS two-factor needs a phone number on the account.
    #[error("a phone number is required for SMS verification")]
    PhoneRequired,

    /// The server can't send codes over the requested channel.
    #[error("{0} verification is not available")]
    MethodUnavailable(mercadoboom_core::TwoFactorMethod),

    /// A field failed validation.
    #[error("{0}")]
    InvalidInput(String),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,

    /// The two-factor code could not be delivered.
    #[error("could not deliver verification code: {0}")]
    Delivery(String),
}
