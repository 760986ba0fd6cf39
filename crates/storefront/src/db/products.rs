//! Product repository.
//!
//! Listing filters are expressed as `$n IS NULL OR ...` predicates so a
//! single statement serves every filter combination. Only the `ORDER BY`
//! clause varies, and it comes from
//! [`ProductSort::order_by`](crate::models::catalog::ProductSort::order_by).

use sqlx::{PgPool, Postgres, Transaction};

use mercadoboom_core::ProductId;

use super::RepositoryError;
use super::users::escape_like;
use crate::models::catalog::{Page, Product, ProductFilter, ProductInput};

/// Stock at or below this level shows up in the admin low-stock list.
pub const LOW_STOCK_THRESHOLD: i32 = 5;

const FILTER_PREDICATES: &str = r"
    ($1 OR p.is_active)
    AND ($2::int IS NULL OR p.category_id = $2)
    AND ($3::text IS NULL OR c.slug = $3)
    AND ($4::text IS NULL OR p.name ILIKE $4 OR p.description ILIKE $4)
    AND ($5::text IS NULL OR p.promotion_tag = $5)
    AND ($6::bool IS NULL OR p.is_featured = $6)
    AND ($7::numeric IS NULL OR p.price >= $7)
    AND ($8::numeric IS NULL OR p.price <= $8)
";

/// Outcome of deleting a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductRemoval {
    Deleted,
    /// Orders reference the product, so it was hidden instead.
    Deactivated,
}

/// Repository for catalog products.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List products matching a filter, with the total match count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(&self, filter: &ProductFilter) -> Result<Page<Product>, RepositoryError> {
        let limit = filter.limit();
        let offset = filter.offset();
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", escape_like(s)));
        let category_slug = filter
            .category
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let promotion_tag = filter
            .promotion_tag
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let list_sql = format!(
            "SELECT p.* FROM products p LEFT JOIN categories c ON c.id = p.category_id \
             WHERE {FILTER_PREDICATES} ORDER BY {} LIMIT $9 OFFSET $10",
            filter.sort.order_by()
        );
        let count_sql = format!(
            "SELECT COUNT(*) FROM products p LEFT JOIN categories c ON c.id = p.category_id \
             WHERE {FILTER_PREDICATES}"
        );

        let items = sqlx::query_as::<_, Product>(&list_sql)
            .bind(filter.include_inactive)
            .bind(filter.category_id)
            .bind(category_slug)
            .bind(search.as_deref())
            .bind(promotion_tag)
            .bind(filter.featured)
            .bind(filter.min_price)
            .bind(filter.max_price)
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool)
            .await?;

        let total = sqlx::query_scalar::<_, i64>(&count_sql)
            .bind(filter.include_inactive)
            .bind(filter.category_id)
            .bind(category_slug)
            .bind(search.as_deref())
            .bind(promotion_tag)
            .bind(filter.featured)
            .bind(filter.min_price)
            .bind(filter.max_price)
            .fetch_one(self.pool)
            .await?;

        Ok(Page {
            items,
            total,
            limit,
            offset,
        })
    }

    /// Get a product by ID, active or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(product)
    }

    /// Get a product by exact name (catalog seeding).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_name(&self, name: &str) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE name = $1 ORDER BY id LIMIT 1",
        )
        .bind(name)
        .fetch_optional(self.pool)
        .await?;
        Ok(product)
    }

    /// Get several products at once. Missing IDs are simply absent.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let raw: Vec<i32> = ids.iter().map(|id| id.as_i32()).collect();
        let products =
            sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ANY($1) ORDER BY id")
                .bind(raw)
                .fetch_all(self.pool)
                .await?;
        Ok(products)
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails (e.g. unknown category).
    pub async fn create(&self, input: &ProductInput) -> Result<Product, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(
            r"
            INSERT INTO products (
                name, description, price, stock, category_id, image_urls, promotion_tag,
                is_featured, is_active, is_affiliate, affiliate_url, is_imported, import_days,
                free_shipping, shipping_cost
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING *
            ",
        )
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(input.price)
        .bind(input.stock)
        .bind(input.category_id)
        .bind(&input.image_urls)
        .bind(input.promotion_tag.as_deref())
        .bind(input.is_featured)
        .bind(input.is_active)
        .bind(input.is_affiliate)
        .bind(input.affiliate_url.as_deref())
        .bind(input.is_imported)
        .bind(input.import_days)
        .bind(input.free_shipping)
        .bind(input.shipping_cost)
        .fetch_one(self.pool)
        .await?;
        Ok(product)
    }

    /// Replace a product's fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    pub async fn update(
        &self,
        id: ProductId,
        input: &ProductInput,
    ) -> Result<Product, RepositoryError> {
        sqlx::query_as::<_, Product>(
            r"
            UPDATE products
            SET name = $2, description = $3, price = $4, stock = $5, category_id = $6,
                image_urls = $7, promotion_tag = $8, is_featured = $9, is_active = $10,
                is_affiliate = $11, affiliate_url = $12, is_imported = $13, import_days = $14,
                free_shipping = $15, shipping_cost = $16, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(id)
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(input.price)
        .bind(input.stock)
        .bind(input.category_id)
        .bind(&input.image_urls)
        .bind(input.promotion_tag.as_deref())
        .bind(input.is_featured)
        .bind(input.is_active)
        .bind(input.is_affiliate)
        .bind(input.affiliate_url.as_deref())
        .bind(input.is_imported)
        .bind(input.import_days)
        .bind(input.free_shipping)
        .bind(input.shipping_cost)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Set the stock level directly.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    pub async fn set_stock(&self, id: ProductId, stock: i32) -> Result<Product, RepositoryError> {
        sqlx::query_as::<_, Product>(
            "UPDATE products SET stock = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(stock)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete a product, or deactivate it when orders still reference it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    pub async fn delete(&self, id: ProductId) -> Result<ProductRemoval, RepositoryError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await;

        match result {
            Ok(done) if done.rows_affected() == 0 => Err(RepositoryError::NotFound),
            Ok(_) => Ok(ProductRemoval::Deleted),
            Err(sqlx::Error::Database(db_err)) if db_err.is_foreign_key_violation() => {
                let hidden = sqlx::query(
                    "UPDATE products SET is_active = FALSE, updated_at = NOW() WHERE id = $1",
                )
                .bind(id)
                .execute(self.pool)
                .await?;
                if hidden.rows_affected() == 0 {
                    return Err(RepositoryError::NotFound);
                }
                Ok(ProductRemoval::Deactivated)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Active products whose stock is at or below [`LOW_STOCK_THRESHOLD`].
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn low_stock(&self) -> Result<Vec<Product>, RepositoryError> {
        let products = sqlx::query_as::<_, Product>(
            r"
            SELECT * FROM products
            WHERE is_active AND NOT is_affiliate AND stock <= $1
            ORDER BY stock ASC, name ASC
            ",
        )
        .bind(LOW_STOCK_THRESHOLD)
        .fetch_all(self.pool)
        .await?;
        Ok(products)
    }

    /// Total number of products, active or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM products")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Take `quantity` units out of stock inside a transaction.
    ///
    /// Returns `false` (and changes nothing) when there is not enough stock.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn decrement_stock(
        tx: &mut Transaction<'_, Postgres>,
        id: ProductId,
        quantity: i32,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE products
            SET stock = stock - $2, updated_at = NOW()
            WHERE id = $1 AND stock >= $2
            ",
        )
        .bind(id)
        .bind(quantity)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Put `quantity` units back into stock inside a transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn restore_stock(
        tx: &mut Transaction<'_, Postgres>,
        id: ProductId,
        quantity: i32,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE products SET stock = stock + $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(quantity)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}
