//! Settings stored as JSONB documents keyed by name.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use sqlx::PgPool;

use super::RepositoryError;

/// Repository for store-wide settings.
pub struct SettingsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SettingsRepository<'a> {
    /// Create a new settings repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Read a setting and deserialize it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored document doesn't
    /// match `T`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, RepositoryError> {
        let value = sqlx::query_scalar::<_, JsonValue>("SELECT value FROM settings WHERE key = $1")
            .bind(key)
            .fetch_optional(self.pool)
            .await?;

        value
            .map(|v| {
                serde_json::from_value(v)
                    .map_err(|e| RepositoryError::DataCorruption(format!("setting {key}: {e}")))
            })
            .transpose()
    }

    /// Write a setting, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set<T: Serialize + Sync>(&self, key: &str, value: &T) -> Result<(), RepositoryError> {
        let json = serde_json::to_value(value)
            .map_err(|e| RepositoryError::DataCorruption(format!("setting {key}: {e}")))?;

        sqlx::query(
            r"
            INSERT INTO settings (key, value)
            VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE SET value = $2, updated_at = NOW()
            ",
        )
        .bind(key)
        .bind(json)
        .execute(self.pool)
        .await?;

        Ok(())
    }
}
