//! Banners and special offers.

use sqlx::PgPool;

use mercadoboom_core::{BannerId, ProductId, SpecialOfferId};

use super::RepositoryError;
use crate::models::catalog::Product;
use crate::models::content::{Banner, BannerInput, SpecialOffer, SpecialOfferInput};

/// Predicate for offers that apply right now (alias `o`).
const CURRENT_OFFER: &str = "o.is_active \
    AND (o.starts_at IS NULL OR o.starts_at <= NOW()) \
    AND (o.ends_at IS NULL OR NOW() < o.ends_at)";

/// Repository for homepage banners and special offers.
pub struct ContentRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ContentRepository<'a> {
    /// Create a new content repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Banners
    // =========================================================================

    /// Banners ordered by position. Inactive ones only when `include_inactive`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn banners(&self, include_inactive: bool) -> Result<Vec<Banner>, RepositoryError> {
        let banners = sqlx::query_as::<_, Banner>(
            "SELECT * FROM banners WHERE $1 OR is_active ORDER BY position ASC, id ASC",
        )
        .bind(include_inactive)
        .fetch_all(self.pool)
        .await?;
        Ok(banners)
    }

    /// Create a banner.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create_banner(&self, input: &BannerInput) -> Result<Banner, RepositoryError> {
        let banner = sqlx::query_as::<_, Banner>(
            r"
            INSERT INTO banners (title, subtitle, image_url, link_url, position, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            ",
        )
        .bind(input.title.trim())
        .bind(input.subtitle.as_deref())
        .bind(input.image_url.trim())
        .bind(input.link_url.as_deref())
        .bind(input.position)
        .bind(input.is_active)
        .fetch_one(self.pool)
        .await?;
        Ok(banner)
    }

    /// Replace a banner's fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the banner doesn't exist.
    pub async fn update_banner(
        &self,
        id: BannerId,
        input: &BannerInput,
    ) -> Result<Banner, RepositoryError> {
        sqlx::query_as::<_, Banner>(
            r"
            UPDATE banners
            SET title = $2, subtitle = $3, image_url = $4, link_url = $5, position = $6,
                is_active = $7, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(id)
        .bind(input.title.trim())
        .bind(input.subtitle.as_deref())
        .bind(input.image_url.trim())
        .bind(input.link_url.as_deref())
        .bind(input.position)
        .bind(input.is_active)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete a banner.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the banner doesn't exist.
    pub async fn delete_banner(&self, id: BannerId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM banners WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    // =========================================================================
    // Special offers
    // =========================================================================

    /// Every offer, newest first (admin).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn offers(&self) -> Result<Vec<SpecialOffer>, RepositoryError> {
        let offers = sqlx::query_as::<_, SpecialOffer>(
            "SELECT * FROM special_offers ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(offers)
    }

    /// Get an offer by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_offer(
        &self,
        id: SpecialOfferId,
    ) -> Result<Option<SpecialOffer>, RepositoryError> {
        let offer = sqlx::query_as::<_, SpecialOffer>("SELECT * FROM special_offers WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(offer)
    }

    /// Offers that apply right now, on active products, each with its product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn current_offers_with_products(
        &self,
    ) -> Result<Vec<(SpecialOffer, Product)>, RepositoryError> {
        let offers = sqlx::query_as::<_, SpecialOffer>(&format!(
            "SELECT o.* FROM special_offers o JOIN products p ON p.id = o.product_id \
             WHERE {CURRENT_OFFER} AND p.is_active \
             ORDER BY o.discount_percentage DESC, o.id ASC"
        ))
        .fetch_all(self.pool)
        .await?;

        let mut product_ids: Vec<i32> = offers.iter().map(|o| o.product_id.as_i32()).collect();
        product_ids.dedup();
        let products =
            sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ANY($1)")
                .bind(product_ids)
                .fetch_all(self.pool)
                .await?;

        let paired = offers
            .into_iter()
            .filter_map(|offer| {
                products
                    .iter()
                    .find(|p| p.id == offer.product_id)
                    .map(|p| (offer, p.clone()))
            })
            .collect();
        Ok(paired)
    }

    /// Offers that apply right now to one product, best discount first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn current_offers_for(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<SpecialOffer>, RepositoryError> {
        let offers = sqlx::query_as::<_, SpecialOffer>(&format!(
            "SELECT o.* FROM special_offers o WHERE o.product_id = $1 AND {CURRENT_OFFER} \
             ORDER BY o.discount_percentage DESC, o.id ASC"
        ))
        .bind(product_id)
        .fetch_all(self.pool)
        .await?;
        Ok(offers)
    }

    /// Offers that apply right now to any of the given products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn current_offers_for_many(
        &self,
        product_ids: &[ProductId],
    ) -> Result<Vec<SpecialOffer>, RepositoryError> {
        let raw: Vec<i32> = product_ids.iter().map(|id| id.as_i32()).collect();
        let offers = sqlx::query_as::<_, SpecialOffer>(&format!(
            "SELECT o.* FROM special_offers o WHERE o.product_id = ANY($1) AND {CURRENT_OFFER}"
        ))
        .bind(raw)
        .fetch_all(self.pool)
        .await?;
        Ok(offers)
    }

    /// Create an offer.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails (e.g. unknown product).
    pub async fn create_offer(
        &self,
        input: &SpecialOfferInput,
    ) -> Result<SpecialOffer, RepositoryError> {
        let offer = sqlx::query_as::<_, SpecialOffer>(
            r"
            INSERT INTO special_offers
                (product_id, title, discount_percentage, starts_at, ends_at, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            ",
        )
        .bind(input.product_id)
        .bind(input.title.trim())
        .bind(input.discount_percentage)
        .bind(input.starts_at)
        .bind(input.ends_at)
        .bind(input.is_active)
        .fetch_one(self.pool)
        .await?;
        Ok(offer)
    }

    /// Replace an offer's fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the offer doesn't exist.
    pub async fn update_offer(
        &self,
        id: SpecialOfferId,
        input: &SpecialOfferInput,
    ) -> Result<SpecialOffer, RepositoryError> {
        sqlx::query_as::<_, SpecialOffer>(
            r"
            UPDATE special_offers
            SET product_id = $2, title = $3, discount_percentage = $4, starts_at = $5,
                ends_at = $6, is_active = $7, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(id)
        .bind(input.product_id)
        .bind(input.title.trim())
        .bind(input.discount_percentage)
        .bind(input.starts_at)
        .bind(input.ends_at)
        .bind(input.is_active)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete an offer.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the offer doesn't exist.
    pub async fn delete_offer(&self, id: SpecialOfferId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM special_offers WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
