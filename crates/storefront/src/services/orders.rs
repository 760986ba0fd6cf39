//! Order lifecycle: status transitions, stock bookkeeping and payment
//! reconciliation.
//!
//! Every change runs inside a transaction holding a row lock on the order.
//! Units leave stock when an order first enters a stock-holding status and go
//! back when a stock-holding order is cancelled; `stock_applied` records which
//! side of that the order is on so neither happens twice.

use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use mercadoboom_core::{OrderId, OrderStatus, PaymentStatus, PaymentType, UserId};

use crate::db::{OrderRepository, ProductRepository, RepositoryError, UserRepository};
use crate::models::order::{Order, UpdateOrderStatusRequest, VerifyTransferRequest};
use crate::services::notifications::Notifier;
use crate::services::payments::GatewayPayment;

/// Errors that can occur changing an order.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("order not found")]
    NotFound,

    #[error("cannot move an order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("{0}")]
    NotAllowed(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for OrderError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

/// What a status change does to stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StockAction {
    None,
    Take,
    Restore,
}

/// Check a status change and work out its stock effect.
///
/// Re-entering the current status is allowed (admins editing tracking
/// numbers) and never touches stock.
fn plan_transition(order: &Order, next: OrderStatus) -> Result<StockAction, OrderError> {
    if order.status == next {
        return Ok(StockAction::None);
    }
    if !order.status.can_transition_to(next) {
        return Err(OrderError::InvalidTransition {
            from: order.status,
            to: next,
        });
    }

    Ok(if next.holds_stock() && !order.stock_applied {
        StockAction::Take
    } else if next == OrderStatus::Cancelado && order.stock_applied {
        StockAction::Restore
    } else {
        StockAction::None
    })
}

/// Move a locked order to `next`, adjusting stock.
async fn transition(
    tx: &mut Transaction<'_, Postgres>,
    order: &mut Order,
    next: OrderStatus,
) -> Result<(), OrderError> {
    match plan_transition(order, next)? {
        StockAction::Take => {
            if ProductRepository::decrement_stock(tx, order.product_id, order.quantity).await? {
                order.stock_applied = true;
            } else {
                // The buyer has paid; the order goes ahead and an admin resolves the shortfall.
                warn!(
                    order_id = %order.id,
                    product_id = %order.product_id,
                    quantity = order.quantity,
                    "Not enough stock for a paid order"
                );
            }
        }
        StockAction::Restore => {
            ProductRepository::restore_stock(tx, order.product_id, order.quantity).await?;
            order.stock_applied = false;
        }
        StockAction::None => {}
    }

    order.status = next;
    Ok(())
}

/// Apply a gateway payment to one order in memory.
///
/// Returns `None` when the notification changes nothing, otherwise the order
/// status to move to (which may equal the current one when only the payment
/// fields change).
fn reconcile(order: &mut Order, payment: &GatewayPayment) -> Option<OrderStatus> {
    let same_payment = order.payment_id.as_deref() == Some(payment.id.as_str());

    // A late failure of an earlier attempt must not undo an approved payment.
    if !same_payment
        && order.payment_status == PaymentStatus::Approved
        && payment.status != PaymentStatus::Approved
    {
        return None;
    }

    if same_payment && order.payment_status == payment.status {
        return None;
    }

    order.payment_id = Some(payment.id.clone());
    order.payment_status = payment.status;

    let next = payment
        .status
        .order_effect()
        .filter(|next| order.status.can_transition_to(*next))
        .unwrap_or(order.status);
    Some(next)
}

/// Order lifecycle service.
pub struct OrderService<'a> {
    pool: &'a PgPool,
    notifier: &'a Notifier,
}

impl<'a> OrderService<'a> {
    /// Create a new order service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, notifier: &'a Notifier) -> Self {
        Self { pool, notifier }
    }

    /// Cancel one of the user's own orders while it is still unpaid.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if the order isn't the user's, and
    /// `OrderError::NotAllowed` if it is no longer pending.
    #[instrument(skip(self))]
    pub async fn cancel_for_user(&self, user_id: UserId, id: OrderId) -> Result<Order, OrderError> {
        let mut tx = self.pool.begin().await?;

        let mut order = OrderRepository::lock(&mut tx, id)
            .await?
            .filter(|o| o.user_id == user_id)
            .ok_or(OrderError::NotFound)?;

        if order.status != OrderStatus::Pendiente {
            return Err(OrderError::NotAllowed(
                "only pending orders can be cancelled".to_string(),
            ));
        }

        transition(&mut tx, &mut order, OrderStatus::Cancelado).await?;
        let order = OrderRepository::save_state(&mut tx, &order).await?;
        tx.commit().await?;

        info!(order_id = %order.id, "Order cancelled by customer");
        Ok(order)
    }

    /// Attach the transfer receipt of a direct-transfer order.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if the order isn't the user's, and
    /// `OrderError::NotAllowed` if it isn't an unpaid direct transfer or the
    /// URL isn't http(s).
    pub async fn attach_receipt(
        &self,
        user_id: UserId,
        id: OrderId,
        receipt_url: &str,
    ) -> Result<Order, OrderError> {
        let repo = OrderRepository::new(self.pool);
        let order = repo
            .get_for_user(user_id, id)
            .await?
            .ok_or(OrderError::NotFound)?;

        if order.payment_type != PaymentType::DirectTransfer {
            return Err(OrderError::NotAllowed(
                "receipts are only accepted for direct transfers".to_string(),
            ));
        }
        if order.status != OrderStatus::Pendiente || order.payment_status != PaymentStatus::Pending
        {
            return Err(OrderError::NotAllowed(
                "this order is no longer awaiting payment".to_string(),
            ));
        }

        let receipt_url = receipt_url.trim();
        let valid = url::Url::parse(receipt_url)
            .is_ok_and(|u| matches!(u.scheme(), "http" | "https"));
        if !valid {
            return Err(OrderError::NotAllowed("invalid receipt URL".to_string()));
        }

        Ok(repo.set_receipt(id, receipt_url).await?)
    }

    /// Admin status change, optionally with tracking number and note.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if the order doesn't exist and
    /// `OrderError::InvalidTransition` if the state machine forbids the move.
    #[instrument(skip(self, request), fields(to = %request.status))]
    pub async fn update_status(
        &self,
        id: OrderId,
        request: &UpdateOrderStatusRequest,
    ) -> Result<Order, OrderError> {
        let mut tx = self.pool.begin().await?;

        let mut order = OrderRepository::lock(&mut tx, id)
            .await?
            .ok_or(OrderError::NotFound)?;
        let previous = order.status;

        transition(&mut tx, &mut order, request.status).await?;
        if let Some(tracking) = non_blank(request.tracking_number.as_deref()) {
            order.tracking_number = Some(tracking);
        }
        if let Some(note) = non_blank(request.note.as_deref()) {
            order.admin_note = Some(note);
        }

        let order = OrderRepository::save_state(&mut tx, &order).await?;
        tx.commit().await?;

        info!(order_id = %order.id, from = %previous, to = %order.status, "Order status updated");

        if previous != order.status {
            self.notify_status(&order).await;
        }
        Ok(order)
    }

    /// Admin decision on a direct transfer.
    ///
    /// Approving marks the payment approved and the order `PAGADO`; rejecting
    /// marks it rejected and cancels the order.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if the order doesn't exist and
    /// `OrderError::NotAllowed` unless it is a pending direct transfer.
    #[instrument(skip(self, request), fields(approved = request.approved))]
    pub async fn verify_transfer(
        &self,
        id: OrderId,
        request: &VerifyTransferRequest,
    ) -> Result<Order, OrderError> {
        let mut tx = self.pool.begin().await?;

        let mut order = OrderRepository::lock(&mut tx, id)
            .await?
            .ok_or(OrderError::NotFound)?;

        if order.payment_type != PaymentType::DirectTransfer {
            return Err(OrderError::NotAllowed("not a direct transfer order".to_string()));
        }
        if order.status != OrderStatus::Pendiente {
            return Err(OrderError::NotAllowed(
                "transfer was already processed".to_string(),
            ));
        }

        let (payment_status, next) = if request.approved {
            (PaymentStatus::Approved, OrderStatus::Pagado)
        } else {
            (PaymentStatus::Rejected, OrderStatus::Cancelado)
        };
        order.payment_status = payment_status;
        transition(&mut tx, &mut order, next).await?;
        if let Some(note) = non_blank(request.note.as_deref()) {
            order.admin_note = Some(note);
        }

        let order = OrderRepository::save_state(&mut tx, &order).await?;
        tx.commit().await?;

        info!(order_id = %order.id, status = %order.status, "Direct transfer verified");

        self.notify_status(&order).await;
        Ok(order)
    }

    /// Apply a gateway payment to every order of its checkout.
    ///
    /// Safe to call repeatedly with the same payment. Returns the orders of
    /// the checkout after the update (empty for an unknown checkout).
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if the database fails.
    #[instrument(skip(self, payment), fields(payment_id = %payment.id, status = %payment.status))]
    pub async fn apply_payment(
        &self,
        checkout_id: Uuid,
        payment: &GatewayPayment,
    ) -> Result<Vec<Order>, OrderError> {
        let mut tx = self.pool.begin().await?;

        let orders = OrderRepository::lock_checkout(&mut tx, checkout_id).await?;
        if let Some((paid, expected)) = amount_mismatch(&orders, payment) {
            warn!(
                %checkout_id,
                %paid,
                %expected,
                status_detail = payment.status_detail.as_deref().unwrap_or_default(),
                "Approved payment amount differs from checkout total"
            );
        }

        let mut result = Vec::with_capacity(orders.len());
        let mut status_changed = Vec::new();

        for mut order in orders {
            let Some(next) = reconcile(&mut order, payment) else {
                result.push(order);
                continue;
            };

            let previous = order.status;
            transition(&mut tx, &mut order, next).await?;
            let order = OrderRepository::save_state(&mut tx, &order).await?;

            if order.status != previous {
                info!(
                    order_id = %order.id,
                    from = %previous,
                    to = %order.status,
                    status_detail = payment.status_detail.as_deref().unwrap_or_default(),
                    "Order updated from payment"
                );
                status_changed.push(order.clone());
            }
            result.push(order);
        }

        tx.commit().await?;

        for order in &status_changed {
            self.notify_status(order).await;
        }
        Ok(result)
    }

    async fn notify_status(&self, order: &Order) {
        match UserRepository::new(self.pool).get_by_id(order.user_id).await {
            Ok(Some(user)) => self.notifier.order_status_changed(&user, order).await,
            Ok(None) => {}
            Err(e) => warn!(order_id = %order.id, error = %e, "Could not load order owner"),
        }
    }
}

/// Paid and expected amounts when an approved payment doesn't cover exactly
/// the checkout total.
fn amount_mismatch(orders: &[Order], payment: &GatewayPayment) -> Option<(Decimal, Decimal)> {
    if payment.status != PaymentStatus::Approved || orders.is_empty() {
        return None;
    }
    let paid = payment.transaction_amount?;
    let expected: Decimal = orders.iter().map(|o| o.total).sum();
    (paid != expected).then_some((paid, expected))
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use mercadoboom_core::ProductId;
    use rust_decimal::Decimal;

    use super::*;

    fn order(status: OrderStatus, stock_applied: bool) -> Order {
        let now = Utc::now();
        Order {
            id: OrderId::new(1),
            checkout_id: Uuid::nil(),
            user_id: UserId::new(1),
            product_id: ProductId::new(1),
            product_name: "Termo".to_string(),
            address_id: None,
            quantity: 1,
            unit_price: Decimal::ONE_HUNDRED,
            subtotal: Decimal::ONE_HUNDRED,
            shipping_cost: Decimal::ZERO,
            discount_percentage: Decimal::ZERO,
            discount_amount: Decimal::ZERO,
            total: Decimal::ONE_HUNDRED,
            status,
            payment_status: PaymentStatus::Pending,
            payment_type: PaymentType::Mercadopago,
            preference_id: Some("pref-1".to_string()),
            payment_id: None,
            transfer_receipt_url: None,
            tracking_number: None,
            admin_note: None,
            stock_applied,
            created_at: now,
            updated_at: now,
        }
    }

    fn payment(id: &str, status: PaymentStatus) -> GatewayPayment {
        GatewayPayment {
            id: id.to_string(),
            status,
            status_detail: None,
            external_reference: None,
            transaction_amount: None,
        }
    }

    #[test]
    fn test_plan_transition_stock_effects() {
        let pending = order(OrderStatus::Pendiente, false);
        assert_eq!(
            plan_transition(&pending, OrderStatus::Pagado).unwrap(),
            StockAction::Take
        );
        assert_eq!(
            plan_transition(&pending, OrderStatus::Cancelado).unwrap(),
            StockAction::None
        );

        let paid = order(OrderStatus::Pagado, true);
        assert_eq!(
            plan_transition(&paid, OrderStatus::EnPreparacion).unwrap(),
            StockAction::None
        );
        assert_eq!(
            plan_transition(&paid, OrderStatus::Cancelado).unwrap(),
            StockAction::Restore
        );

        // paid but never reserved: the next holding status retries the take
        let unreserved = order(OrderStatus::Pagado, false);
        assert_eq!(
            plan_transition(&unreserved, OrderStatus::EnPreparacion).unwrap(),
            StockAction::Take
        );
        assert_eq!(
            plan_transition(&unreserved, OrderStatus::Cancelado).unwrap(),
            StockAction::None
        );
    }

    #[test]
    fn test_plan_transition_rejects_illegal_moves() {
        let delivered = order(OrderStatus::Entregado, true);
        assert!(matches!(
            plan_transition(&delivered, OrderStatus::Cancelado),
            Err(OrderError::InvalidTransition {
                from: OrderStatus::Entregado,
                to: OrderStatus::Cancelado
            })
        ));

        let pending = order(OrderStatus::Pendiente, false);
        assert!(plan_transition(&pending, OrderStatus::Enviado).is_err());
    }

    #[test]
    fn test_plan_transition_same_status_is_noop() {
        let shipped = order(OrderStatus::Enviado, true);
        assert_eq!(
            plan_transition(&shipped, OrderStatus::Enviado).unwrap(),
            StockAction::None
        );
    }

    #[test]
    fn test_reconcile_approved_payment() {
        let mut o = order(OrderStatus::Pendiente, false);
        let next = reconcile(&mut o, &payment("100", PaymentStatus::Approved));
        assert_eq!(next, Some(OrderStatus::Pagado));
        assert_eq!(o.payment_id.as_deref(), Some("100"));
        assert_eq!(o.payment_status, PaymentStatus::Approved);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let mut o = order(OrderStatus::Pagado, true);
        o.payment_id = Some("100".to_string());
        o.payment_status = PaymentStatus::Approved;
        assert_eq!(reconcile(&mut o, &payment("100", PaymentStatus::Approved)), None);
    }

    #[test]
    fn test_reconcile_in_process_records_without_status_change() {
        let mut o = order(OrderStatus::Pendiente, false);
        let next = reconcile(&mut o, &payment("100", PaymentStatus::InProcess));
        assert_eq!(next, Some(OrderStatus::Pendiente));
        assert_eq!(o.payment_status, PaymentStatus::InProcess);
    }

    #[test]
    fn test_reconcile_refund_cancels_paid_order() {
        let mut o = order(OrderStatus::Pagado, true);
        o.payment_id = Some("100".to_string());
        o.payment_status = PaymentStatus::Approved;
        let next = reconcile(&mut o, &payment("100", PaymentStatus::Refunded));
        assert_eq!(next, Some(OrderStatus::Cancelado));
    }

    #[test]
    fn test_reconcile_ignores_stale_failed_attempt() {
        let mut o = order(OrderStatus::Pagado, true);
        o.payment_id = Some("200".to_string());
        o.payment_status = PaymentStatus::Approved;
        assert_eq!(reconcile(&mut o, &payment("100", PaymentStatus::Rejected)), None);
        assert_eq!(o.payment_id.as_deref(), Some("200"));
    }

    #[test]
    fn test_reconcile_does_not_reopen_terminal_orders() {
        let mut o = order(OrderStatus::Cancelado, false);
        let next = reconcile(&mut o, &payment("100", PaymentStatus::Approved));
        assert_eq!(next, Some(OrderStatus::Cancelado));
        assert_eq!(o.payment_status, PaymentStatus::Approved);
    }

    #[test]
    fn test_amount_mismatch_on_approved_payments_only() {
        let orders = vec![order(OrderStatus::Pendiente, false), order(OrderStatus::Pendiente, false)];

        let mut paid = payment("pay-1", PaymentStatus::Approved);
        paid.transaction_amount = Some(Decimal::from(200));
        assert_eq!(amount_mismatch(&orders, &paid), None);

        paid.transaction_amount = Some(Decimal::from(150));
        assert_eq!(
            amount_mismatch(&orders, &paid),
            Some((Decimal::from(150), Decimal::from(200)))
        );

        paid.transaction_amount = None;
        assert_eq!(amount_mismatch(&orders, &paid), None);

        let mut pending = payment("pay-2", PaymentStatus::InProcess);
        pending.transaction_amount = Some(Decimal::from(1));
        assert_eq!(amount_mismatch(&orders, &pending), None);
        assert_eq!(amount_mismatch(&[], &paid), None);
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some("  AR123  ")).as_deref(), Some("AR123"));
        assert_eq!(non_blank(Some("   ")), None);
        assert_eq!(non_blank(None), None);
    }
}
