//! Admin user management commands.
//!
//! # Usage
//!
//! ```bash
//! # Create a new admin user with a password
//! mb-cli admin create -e admin@example.com -p 'Str0ngPassw0rd' -f Ana -l Gómez
//!
//! # Promote an existing customer
//! mb-cli admin promote -e ana@example.com
//! ```

use mercadoboom_core::{Email, EmailError};
use mercadoboom_storefront::db::{RepositoryError, UserRepository};
use mercadoboom_storefront::services::auth::{AuthError, AuthService};
use mercadoboom_storefront::services::notifications::Notifier;
use thiserror::Error;

use super::MissingDatabaseUrl;

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    MissingEnvVar(#[from] MissingDatabaseUrl),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// No account with that email.
    #[error("No user with email: {0}")]
    UnknownUser(String),
}

/// Create a new admin user.
///
/// # Returns
///
/// The ID of the created user.
///
/// # Errors
///
/// Returns `AdminError::Auth` when the email is taken or the password is weak.
pub async fn create_user(
    email: &str,
    password: &str,
    first_name: &str,
    last_name: &str,
) -> Result<String, AdminError> {
    let url = super::database_url()?;
    let pool = mercadoboom_storefront::db::create_pool(&url).await?;

    tracing::info!("Creating admin user: {}", email);

    // No delivery channels: admin creation sends nothing.
    let notifier = Notifier::new(None, None, String::new());
    let user = AuthService::new(&pool, &notifier)
        .create_admin(email, password, first_name, last_name)
        .await?;

    tracing::info!(
        "Admin user created successfully! ID: {}, Email: {}",
        user.id,
        user.email
    );

    Ok(user.id.to_string())
}

/// Grant admin rights to an existing user.
///
/// # Errors
///
/// Returns `AdminError::UnknownUser` if no account uses `email`.
pub async fn promote(email: &str) -> Result<(), AdminError> {
    let email = Email::parse(email)?;
    let url = super::database_url()?;
    let pool = mercadoboom_storefront::db::create_pool(&url).await?;

    let users = UserRepository::new(&pool);
    let user = users
        .get_by_email(&email)
        .await?
        .ok_or_else(|| AdminError::UnknownUser(email.to_string()))?;

    if user.is_admin {
        tracing::info!("{} is already an admin", email);
        return Ok(());
    }

    users.set_admin(user.id, true).await?;
    tracing::info!("{} is now an admin (ID: {})", email, user.id);
    Ok(())
}
