//! Orders and checkout request/response types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mercadoboom_core::{
    AddressId, OrderId, OrderStatus, PaymentStatus, PaymentType, ProductId, UserId,
};

use super::settings::BankDetails;

/// One product line of a checkout.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Order {
    pub id: OrderId,
    pub checkout_id: Uuid,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub product_name: String,
    pub address_id: Option<AddressId>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub discount_percentage: Decimal,
    pub discount_amount: Decimal,
    pub total: Decimal,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_type: PaymentType,
    pub preference_id: Option<String>,
    pub payment_id: Option<String>,
    pub transfer_receipt_url: Option<String>,
    pub tracking_number: Option<String>,
    pub admin_note: Option<String>,
    pub stock_applied: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields of an order before it is inserted.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub checkout_id: Uuid,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub product_name: String,
    pub address_id: AddressId,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub discount_percentage: Decimal,
    pub discount_amount: Decimal,
    pub total: Decimal,
    pub payment_type: PaymentType,
}

/// An explicit checkout line.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutItem {
    pub product_id: ProductId,
    pub quantity: i32,
}

/// Body of both checkout endpoints.
///
/// When `items` is omitted the user's cart is checked out and cleared.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub address_id: AddressId,
    pub items: Option<Vec<CheckoutItem>>,
}

/// Response of `create-preference`.
#[derive(Debug, Serialize)]
pub struct PreferenceResponse {
    pub checkout_id: Uuid,
    pub preference_id: String,
    pub init_point: String,
    pub orders: Vec<Order>,
}

/// Response of `create-direct-transfer`.
#[derive(Debug, Serialize)]
pub struct DirectTransferResponse {
    pub checkout_id: Uuid,
    pub orders: Vec<Order>,
    pub total: Decimal,
    pub bank_details: BankDetails,
}

/// Receipt upload notification for a direct transfer order.
#[derive(Debug, Deserialize)]
pub struct AttachReceiptRequest {
    pub receipt_url: String,
}

/// Admin status change.
#[derive(Debug, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
    pub tracking_number: Option<String>,
    pub note: Option<String>,
}

/// Admin decision on a direct transfer.
#[derive(Debug, Deserialize)]
pub struct VerifyTransferRequest {
    pub approved: bool,
    pub note: Option<String>,
}

/// Admin order listing filters.
#[derive(Debug, Default, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub payment_type: Option<PaymentType>,
    pub user_id: Option<UserId>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl OrderFilter {
    /// Page size clamped to `1..=100`.
    #[must_use]
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(50).clamp(1, 100)
    }

    /// Offset, never negative.
    #[must_use]
    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}
