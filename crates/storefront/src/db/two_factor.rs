//! Pending two-factor login codes.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use mercadoboom_core::UserId;

use super::RepositoryError;

/// A stored (hashed) two-factor code.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TwoFactorCode {
    pub id: i32,
    pub user_id: UserId,
    pub code_hash: String,
    pub attempts: i32,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Repository for two-factor codes.
pub struct TwoFactorRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> TwoFactorRepository<'a> {
    /// Create a new two-factor repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Store a new code, retiring any unused code the user still had.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create(
        &self,
        user_id: UserId,
        code_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<TwoFactorCode, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE two_factor_codes SET used_at = NOW() WHERE user_id = $1 AND used_at IS NULL",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        let code = sqlx::query_as::<_, TwoFactorCode>(
            r"
            INSERT INTO two_factor_codes (user_id, code_hash, expires_at)
            VALUES ($1, $2, $3)
            RETURNING *
            ",
        )
        .bind(user_id)
        .bind(code_hash)
        .bind(expires_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(code)
    }

    /// The most recent unused code for a user, expired or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn latest_unused(
        &self,
        user_id: UserId,
    ) -> Result<Option<TwoFactorCode>, RepositoryError> {
        let code = sqlx::query_as::<_, TwoFactorCode>(
            r"
            SELECT * FROM two_factor_codes
            WHERE user_id = $1 AND used_at IS NULL
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            ",
        )
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(code)
    }

    /// Spend one attempt on a live code and return the new total.
    ///
    /// Returns `None` once `max_attempts` are spent or the code was used, so
    /// concurrent guesses can never exceed the budget.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn claim_attempt(
        &self,
        id: i32,
        max_attempts: i32,
    ) -> Result<Option<i32>, RepositoryError> {
        let attempts = sqlx::query_scalar::<_, i32>(
            r"
            UPDATE two_factor_codes SET attempts = attempts + 1
            WHERE id = $1 AND attempts < $2 AND used_at IS NULL
            RETURNING attempts
            ",
        )
        .bind(id)
        .bind(max_attempts)
        .fetch_optional(self.pool)
        .await?;
        Ok(attempts)
    }

    /// Consume a code. Returns `false` if it was already used.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn mark_used(&self, id: i32) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE two_factor_codes SET used_at = NOW() WHERE id = $1 AND used_at IS NULL",
        )
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
