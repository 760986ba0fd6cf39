//! Address repository. Every query is scoped to the owning user.

use sqlx::{PgPool, Postgres, Transaction};

use mercadoboom_core::{AddressId, UserId};

use super::RepositoryError;
use crate::models::address::{Address, AddressInput};

/// Repository for user shipping addresses.
pub struct AddressRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AddressRepository<'a> {
    /// Create a new address repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// A user's addresses, default first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<Address>, RepositoryError> {
        let addresses = sqlx::query_as::<_, Address>(
            "SELECT * FROM addresses WHERE user_id = $1 ORDER BY is_default DESC, created_at ASC",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(addresses)
    }

    /// Get one of a user's addresses.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        user_id: UserId,
        id: AddressId,
    ) -> Result<Option<Address>, RepositoryError> {
        let address =
            sqlx::query_as::<_, Address>("SELECT * FROM addresses WHERE id = $1 AND user_id = $2")
                .bind(id)
                .bind(user_id)
                .fetch_optional(self.pool)
                .await?;
        Ok(address)
    }

    /// Get an address by ID regardless of owner (admin order views).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_any(&self, id: AddressId) -> Result<Option<Address>, RepositoryError> {
        let address = sqlx::query_as::<_, Address>("SELECT * FROM addresses WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(address)
    }

    /// Create an address. The user's first address always becomes the default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn create(
        &self,
        user_id: UserId,
        input: &AddressInput,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let existing =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM addresses WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&mut *tx)
                .await?;
        let is_default = input.is_default || existing == 0;
        if is_default {
            clear_default(&mut tx, user_id).await?;
        }

        let address = sqlx::query_as::<_, Address>(
            r"
            INSERT INTO addresses (
                user_id, recipient, street, number, apartment, city, province,
                postal_code, phone, notes, is_default
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            ",
        )
        .bind(user_id)
        .bind(input.recipient.trim())
        .bind(input.street.trim())
        .bind(input.number.trim())
        .bind(input.apartment.as_deref())
        .bind(input.city.trim())
        .bind(input.province.trim())
        .bind(input.postal_code.trim())
        .bind(input.phone.as_deref())
        .bind(input.notes.as_deref())
        .bind(is_default)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(address)
    }

    /// Update one of a user's addresses.
    ///
    /// Setting `is_default` moves the default flag here; clearing it on the
    /// current default keeps the flag (a user with addresses always has one).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address doesn't belong to the user.
    pub async fn update(
        &self,
        user_id: UserId,
        id: AddressId,
        input: &AddressInput,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        if input.is_default {
            clear_default(&mut tx, user_id).await?;
        }

        let address = sqlx::query_as::<_, Address>(
            r"
            UPDATE addresses
            SET recipient = $3, street = $4, number = $5, apartment = $6, city = $7,
                province = $8, postal_code = $9, phone = $10, notes = $11,
                is_default = is_default OR $12, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING *
            ",
        )
        .bind(id)
        .bind(user_id)
        .bind(input.recipient.trim())
        .bind(input.street.trim())
        .bind(input.number.trim())
        .bind(input.apartment.as_deref())
        .bind(input.city.trim())
        .bind(input.province.trim())
        .bind(input.postal_code.trim())
        .bind(input.phone.as_deref())
        .bind(input.notes.as_deref())
        .bind(input.is_default)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        tx.commit().await?;
        Ok(address)
    }

    /// Make an address the user's default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address doesn't belong to the user.
    pub async fn set_default(
        &self,
        user_id: UserId,
        id: AddressId,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        clear_default(&mut tx, user_id).await?;

        let address = sqlx::query_as::<_, Address>(
            r"
            UPDATE addresses SET is_default = TRUE, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING *
            ",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        tx.commit().await?;
        Ok(address)
    }

    /// Delete one of a user's addresses. If it was the default, the oldest
    /// remaining address takes over.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address doesn't belong to the user.
    pub async fn delete(&self, user_id: UserId, id: AddressId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let was_default = sqlx::query_scalar::<_, bool>(
            "DELETE FROM addresses WHERE id = $1 AND user_id = $2 RETURNING is_default",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        if was_default {
            sqlx::query(
                r"
                UPDATE addresses SET is_default = TRUE, updated_at = NOW()
                WHERE id = (
                    SELECT id FROM addresses WHERE user_id = $1
                    ORDER BY created_at ASC, id ASC LIMIT 1
                )
                ",
            )
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

async fn clear_default(
    tx: &mut Transaction<'_, Postgres>,
    user_id: UserId,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "UPDATE addresses SET is_default = FALSE, updated_at = NOW() WHERE user_id = $1 AND is_default",
    )
    .bind(user_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
