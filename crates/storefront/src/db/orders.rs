//! Order repository.
//!
//! State changes (status, payment status, stock bookkeeping) go through
//! [`OrderRepository::lock`] and [`OrderRepository::save_state`] inside a
//! caller-owned transaction so the order row and product stock move together.

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use mercadoboom_core::{OrderId, OrderStatus, PaymentStatus, PaymentType, UserId};

use super::RepositoryError;
use crate::models::catalog::Page;
use crate::models::order::{NewOrder, Order, OrderFilter};

/// Number of orders in one status.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StatusCount {
    pub status: OrderStatus,
    pub count: i64,
}

/// Aggregate order figures for the admin dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct OrderStats {
    pub total_orders: i64,
    pub orders_by_status: Vec<StatusCount>,
    /// Sum of totals of orders in a stock-holding status.
    pub revenue: Decimal,
    /// Direct-transfer orders still waiting for verification.
    pub pending_transfers: i64,
}

/// Repository for orders.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert all orders of one checkout atomically, with the gateway
    /// preference they are paid through (if any).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any insert fails; nothing is kept.
    pub async fn create_batch(
        &self,
        orders: &[NewOrder],
        preference_id: Option<&str>,
    ) -> Result<Vec<Order>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(orders.len());

        for new in orders {
            let order = sqlx::query_as::<_, Order>(
                r"
                INSERT INTO orders (
                    checkout_id, user_id, product_id, product_name, address_id, quantity,
                    unit_price, subtotal, shipping_cost, discount_percentage, discount_amount,
                    total, payment_type, preference_id
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                RETURNING *
                ",
            )
            .bind(new.checkout_id)
            .bind(new.user_id)
            .bind(new.product_id)
            .bind(&new.product_name)
            .bind(new.address_id)
            .bind(new.quantity)
            .bind(new.unit_price)
            .bind(new.subtotal)
            .bind(new.shipping_cost)
            .bind(new.discount_percentage)
            .bind(new.discount_amount)
            .bind(new.total)
            .bind(new.payment_type)
            .bind(preference_id)
            .fetch_one(&mut *tx)
            .await?;
            created.push(order);
        }

        tx.commit().await?;
        Ok(created)
    }

    /// Get an order by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(order)
    }

    /// Get an order only if it belongs to the user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_for_user(
        &self,
        user_id: UserId,
        id: OrderId,
    ) -> Result<Option<Order>, RepositoryError> {
        let order =
            sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 AND user_id = $2")
                .bind(id)
                .bind(user_id)
                .fetch_optional(self.pool)
                .await?;
        Ok(order)
    }

    /// A user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let orders = sqlx::query_as::<_, Order>(
            "SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(orders)
    }

    /// Admin listing with filters and pagination.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(&self, filter: &OrderFilter) -> Result<Page<Order>, RepositoryError> {
        const PREDICATES: &str = r"
            ($1::order_status IS NULL OR status = $1)
            AND ($2::payment_status IS NULL OR payment_status = $2)
            AND ($3::payment_type IS NULL OR payment_type = $3)
            AND ($4::int IS NULL OR user_id = $4)
        ";
        let limit = filter.limit();
        let offset = filter.offset();

        let items = sqlx::query_as::<_, Order>(&format!(
            "SELECT * FROM orders WHERE {PREDICATES} ORDER BY created_at DESC, id DESC LIMIT $5 OFFSET $6"
        ))
        .bind(filter.status)
        .bind(filter.payment_status)
        .bind(filter.payment_type)
        .bind(filter.user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        let total =
            sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM orders WHERE {PREDICATES}"))
                .bind(filter.status)
                .bind(filter.payment_status)
                .bind(filter.payment_type)
                .bind(filter.user_id)
                .fetch_one(self.pool)
                .await?;

        Ok(Page {
            items,
            total,
            limit,
            offset,
        })
    }

    /// Store the transfer receipt URL of an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist.
    pub async fn set_receipt(
        &self,
        id: OrderId,
        receipt_url: &str,
    ) -> Result<Order, RepositoryError> {
        sqlx::query_as::<_, Order>(
            r"
            UPDATE orders SET transfer_receipt_url = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(id)
        .bind(receipt_url)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Lock an order row for the rest of the transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lock(
        tx: &mut Transaction<'_, Postgres>,
        id: OrderId,
    ) -> Result<Option<Order>, RepositoryError> {
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(order)
    }

    /// Lock every order of a checkout for the rest of the transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lock_checkout(
        tx: &mut Transaction<'_, Postgres>,
        checkout_id: Uuid,
    ) -> Result<Vec<Order>, RepositoryError> {
        let orders = sqlx::query_as::<_, Order>(
            "SELECT * FROM orders WHERE checkout_id = $1 ORDER BY id FOR UPDATE",
        )
        .bind(checkout_id)
        .fetch_all(&mut **tx)
        .await?;
        Ok(orders)
    }

    /// Persist the mutable state of a locked order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist.
    pub async fn save_state(
        tx: &mut Transaction<'_, Postgres>,
        order: &Order,
    ) -> Result<Order, RepositoryError> {
        sqlx::query_as::<_, Order>(
            r"
            UPDATE orders
            SET status = $2, payment_status = $3, payment_id = $4, tracking_number = $5,
                admin_note = $6, stock_applied = $7, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(order.id)
        .bind(order.status)
        .bind(order.payment_status)
        .bind(order.payment_id.as_deref())
        .bind(order.tracking_number.as_deref())
        .bind(order.admin_note.as_deref())
        .bind(order.stock_applied)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Aggregate figures for the dashboard.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn stats(&self) -> Result<OrderStats, RepositoryError> {
        let orders_by_status = sqlx::query_as::<_, StatusCount>(
            "SELECT status, COUNT(*) AS count FROM orders GROUP BY status ORDER BY status",
        )
        .fetch_all(self.pool)
        .await?;

        let holding: Vec<OrderStatus> = OrderStatus::ALL
            .iter()
            .copied()
            .filter(|s| s.holds_stock())
            .collect();
        let revenue = sqlx::query_scalar::<_, Decimal>(
            "SELECT COALESCE(SUM(total), 0) FROM orders WHERE status = ANY($1)",
        )
        .bind(holding)
        .fetch_one(self.pool)
        .await?;

        let pending_transfers = sqlx::query_scalar::<_, i64>(
            r"
            SELECT COUNT(*) FROM orders
            WHERE payment_type = $1 AND status = $2 AND payment_status = $3
            ",
        )
        .bind(PaymentType::DirectTransfer)
        .bind(OrderStatus::Pendiente)
        .bind(PaymentStatus::Pending)
        .fetch_one(self.pool)
        .await?;

        let total_orders = orders_by_status.iter().map(|s| s.count).sum();

        Ok(OrderStats {
            total_orders,
            orders_by_status,
            revenue,
            pending_transfers,
        })
    }
}
