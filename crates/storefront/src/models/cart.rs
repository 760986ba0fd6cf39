//! Server-side shopping cart.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use mercadoboom_core::ProductId;

use super::catalog::Product;

/// A cart row joined with its product.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CartItem {
    #[sqlx(flatten)]
    pub product: Product,
    pub quantity: i32,
}

/// One priced cart line.
#[derive(Debug, Serialize)]
pub struct CartLine {
    pub product: Product,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

/// The cart as returned to the client.
#[derive(Debug, Serialize)]
pub struct CartView {
    pub items: Vec<CartLine>,
    pub item_count: i32,
    pub subtotal: Decimal,
}

/// Add-to-cart body.
#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: ProductId,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

/// Set-quantity body. Zero removes the line.
#[derive(Debug, Deserialize)]
pub struct SetQuantityRequest {
    pub quantity: i32,
}

const fn default_quantity() -> i32 {
    1
}
