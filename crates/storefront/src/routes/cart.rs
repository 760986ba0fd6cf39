//! Cart route handlers.
//!
//! The cart lives in the database, one row per product. Every mutating call
//! returns the whole cart so the client never has to re-fetch it.

use axum::{
    Json,
    extract::{Path, State},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::instrument;

use mercadoboom_core::{ProductId, UserId, round_money};

use crate::db::{CartRepository, ContentRepository, ProductRepository, RepositoryError};
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::cart::{AddToCartRequest, CartItem, CartLine, CartView, SetQuantityRequest};
use crate::models::content::SpecialOffer;
use crate::services::checkout::{CheckoutError, check_purchasable};
use crate::services::pricing::{best_offer, effective_unit_price};
use crate::state::AppState;

/// Price cart rows with the offers running at `now`.
fn cart_view(items: Vec<CartItem>, offers: &[SpecialOffer], now: DateTime<Utc>) -> CartView {
    let lines: Vec<CartLine> = items
        .into_iter()
        .map(|item| {
            let offer = best_offer(offers, &item.product, now);
            let unit_price = effective_unit_price(&item.product, offer);
            let line_total = round_money(unit_price * Decimal::from(item.quantity));
            CartLine {
                product: item.product,
                quantity: item.quantity,
                unit_price,
                line_total,
            }
        })
        .collect();

    CartView {
        item_count: lines.iter().map(|l| l.quantity).sum(),
        subtotal: lines.iter().map(|l| l.line_total).sum(),
        items: lines,
    }
}

async fn load_cart(state: &AppState, user_id: UserId) -> Result<CartView> {
    let items = CartRepository::new(state.pool()).items(user_id).await?;
    let ids: Vec<ProductId> = items.iter().map(|i| i.product.id).collect();
    let offers = if ids.is_empty() {
        Vec::new()
    } else {
        ContentRepository::new(state.pool())
            .current_offers_for_many(&ids)
            .await?
    };
    Ok(cart_view(items, &offers, Utc::now()))
}

/// Check that `quantity` units of a product may sit in a cart.
async fn check_product(state: &AppState, product_id: ProductId, quantity: i32) -> Result<()> {
    let product = ProductRepository::new(state.pool())
        .get_by_id(product_id)
        .await?
        .ok_or(CheckoutError::ProductNotFound(product_id))?;
    check_purchasable(&product, quantity)?;
    Ok(())
}

/// GET /api/cart
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn show(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<CartView>> {
    Ok(Json(load_cart(&state, user.id).await?))
}

/// POST /api/cart/items
///
/// Adds to an existing line. The combined quantity must fit in stock.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn add(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(request): Json<AddToCartRequest>,
) -> Result<Json<CartView>> {
    if request.quantity < 1 {
        return Err(CheckoutError::InvalidQuantity.into());
    }

    let carts = CartRepository::new(state.pool());
    let current = carts.quantity_of(user.id, request.product_id).await?;
    let wanted = current
        .checked_add(request.quantity)
        .ok_or(CheckoutError::InvalidQuantity)?;
    check_product(&state, request.product_id, wanted).await?;

    carts.add(user.id, request.product_id, request.quantity).await?;
    Ok(Json(load_cart(&state, user.id).await?))
}

/// PUT /api/cart/items/{product_id}
///
/// Zero removes the line.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn set_quantity(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(product_id): Path<ProductId>,
    Json(request): Json<SetQuantityRequest>,
) -> Result<Json<CartView>> {
    let carts = CartRepository::new(state.pool());

    match request.quantity {
        q if q < 0 => return Err(CheckoutError::InvalidQuantity.into()),
        0 => carts.remove(user.id, product_id).await?,
        q => {
            check_product(&state, product_id, q).await?;
            carts
                .set_quantity(user.id, product_id, q)
                .await
                .map_err(|e| match e {
                    RepositoryError::NotFound => {
                        AppError::NotFound(format!("product {product_id} is not in the cart"))
                    }
                    other => other.into(),
                })?;
        }
    }

    Ok(Json(load_cart(&state, user.id).await?))
}

/// DELETE /api/cart/items/{product_id}
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn remove(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(product_id): Path<ProductId>,
) -> Result<Json<CartView>> {
    CartRepository::new(state.pool())
        .remove(user.id, product_id)
        .await?;
    Ok(Json(load_cart(&state, user.id).await?))
}

/// DELETE /api/cart
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn clear(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<CartView>> {
    CartRepository::new(state.pool()).clear(user.id).await?;
    Ok(Json(cart_view(Vec::new(), &[], Utc::now())))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;
    use mercadoboom_core::{Percentage, SpecialOfferId};

    use super::*;
    use crate::models::catalog::Product;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn item(id: i32, price: &str, quantity: i32) -> CartItem {
        let now = Utc::now();
        CartItem {
            product: Product {
                id: ProductId::new(id),
                name: format!("Producto {id}"),
                description: String::new(),
                price: dec(price),
                stock: 10,
                category_id: None,
                image_urls: vec![],
                promotion_tag: None,
                is_featured: false,
                is_active: true,
                is_affiliate: false,
                affiliate_url: None,
                is_imported: false,
                import_days: None,
                free_shipping: true,
                shipping_cost: Decimal::ZERO,
                created_at: now,
                updated_at: now,
            },
            quantity,
        }
    }

    fn offer(product_id: i32, pct: &str) -> SpecialOffer {
        let now = Utc::now();
        SpecialOffer {
            id: SpecialOfferId::new(1),
            product_id: ProductId::new(product_id),
            title: "Hot Sale".to_string(),
            discount_percentage: Percentage::new(dec(pct)).unwrap(),
            starts_at: Some(now - Duration::hours(1)),
            ends_at: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_cart_view_totals() {
        let view = cart_view(
            vec![item(1, "1000.00", 2), item(2, "250.50", 1)],
            &[],
            Utc::now(),
        );
        assert_eq!(view.item_count, 3);
        assert_eq!(view.items[0].line_total, dec("2000.00"));
        assert_eq!(view.subtotal, dec("2250.50"));
    }

    #[test]
    fn test_cart_view_applies_offers() {
        let view = cart_view(
            vec![item(1, "1000.00", 3), item(2, "500.00", 1)],
            &[offer(1, "15")],
            Utc::now(),
        );
        assert_eq!(view.items[0].unit_price, dec("850.00"));
        assert_eq!(view.items[0].line_total, dec("2550.00"));
        assert_eq!(view.items[1].unit_price, dec("500.00"));
        assert_eq!(view.subtotal, dec("3050.00"));
    }

    #[test]
    fn test_empty_cart() {
        let view = cart_view(Vec::new(), &[], Utc::now());
        assert!(view.items.is_empty());
        assert_eq!(view.item_count, 0);
        assert_eq!(view.subtotal, Decimal::ZERO);
    }
}
