//! Checkout: turns a cart or an explicit item list into priced orders.
//!
//! Both payment paths share the same validation and pricing:
//!
//! 1. The shipping address must belong to the buyer.
//! 2. Each product must exist, be active, not be an affiliate listing and have
//!    enough stock for the requested quantity.
//! 3. Each line is priced with its best current offer; direct transfers also
//!    get the configured transfer discount.
//! 4. One order per line is inserted, all sharing a fresh `checkout_id`.
//!
//! MercadoPago checkouts create the hosted-checkout preference (with
//! `external_reference` set to the `checkout_id`) before step 4, so orders
//! only exist for checkouts the gateway accepted.

use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, instrument};
use uuid::Uuid;

use mercadoboom_core::{CurrencyCode, Percentage, PaymentType, ProductId};

use crate::db::{
    AddressRepository, CartRepository, ContentRepository, OrderRepository, ProductRepository,
    RepositoryError,
};
use crate::models::catalog::Product;
use crate::models::content::SpecialOffer;
use crate::models::order::{
    CheckoutItem, CheckoutRequest, DirectTransferResponse, NewOrder, Order, PreferenceResponse,
};
use crate::models::user::User;
use crate::services::notifications::Notifier;
use crate::services::payments::{
    BackUrls, PaymentError, PaymentGateway, PreferenceItem, PreferenceRequest,
};
use crate::services::pricing;
use crate::services::settings::SettingsService;

/// Errors that can occur during checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("address not found")]
    AddressNotFound,

    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error("nothing to check out")]
    EmptyCart,

    #[error("quantities must be at least 1")]
    InvalidQuantity,

    #[error("{0} is not available")]
    ProductUnavailable(String),

    #[error("{0} is sold through an affiliate and can't be checked out")]
    AffiliateProduct(String),

    #[error("only {available} units of {product} left, {requested} requested")]
    InsufficientStock {
        product: String,
        available: i32,
        requested: i32,
    },

    #[error("payment method {0} is disabled")]
    MethodDisabled(&'static str),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Payment(#[from] PaymentError),
}

/// Public URLs the gateway needs.
#[derive(Debug, Clone, Copy)]
pub struct CheckoutUrls<'a> {
    /// SPA the buyer returns to.
    pub frontend_url: &'a str,
    /// This API, for the notification URL.
    pub base_url: &'a str,
}

/// Checkout service.
pub struct CheckoutService<'a> {
    pool: &'a PgPool,
    settings: &'a SettingsService,
    notifier: &'a Notifier,
}

/// Product lines resolved against the catalog.
struct Lines {
    items: Vec<(Product, i32)>,
    from_cart: bool,
}

impl<'a> CheckoutService<'a> {
    /// Create a new checkout service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, settings: &'a SettingsService, notifier: &'a Notifier) -> Self {
        Self {
            pool,
            settings,
            notifier,
        }
    }

    /// Check out through MercadoPago.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::MethodDisabled` if MercadoPago is switched off,
    /// `CheckoutError::Payment` if the gateway is missing or fails, and the
    /// validation errors described in the module docs.
    #[instrument(skip(self, user, request, gateway, urls), fields(user_id = %user.id))]
    pub async fn create_preference(
        &self,
        user: &User,
        request: &CheckoutRequest,
        gateway: Option<&dyn PaymentGateway>,
        urls: CheckoutUrls<'_>,
    ) -> Result<PreferenceResponse, CheckoutError> {
        let config = self.settings.payment_config(self.pool).await?;
        if !config.mercadopago_enabled {
            return Err(CheckoutError::MethodDisabled("mercadopago"));
        }
        let gateway = gateway.ok_or(CheckoutError::Payment(PaymentError::NotConfigured))?;

        let lines = self.resolve_lines(user, request).await?;
        let checkout_id = Uuid::new_v4();
        let new_orders = self
            .price_lines(user, request, &lines, checkout_id, PaymentType::Mercadopago, Percentage::ZERO)
            .await?;

        // The preference goes first: a gateway failure leaves nothing behind.
        let preference = gateway
            .create_preference(&PreferenceRequest {
                external_reference: checkout_id.to_string(),
                items: preference_items(&new_orders),
                payer_email: user.email.as_str().to_string(),
                back_urls: back_urls(urls.frontend_url),
                notification_url: format!("{}/api/payments/webhook", urls.base_url),
            })
            .await?;

        let orders = OrderRepository::new(self.pool)
            .create_batch(&new_orders, Some(&preference.id))
            .await?;

        self.finish(user, &lines, &orders).await?;

        info!(
            %checkout_id,
            preference_id = %preference.id,
            order_count = orders.len(),
            "MercadoPago checkout created"
        );

        Ok(PreferenceResponse {
            checkout_id,
            preference_id: preference.id,
            init_point: preference.init_point,
            orders,
        })
    }

    /// Check out by direct bank transfer.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::MethodDisabled` if transfers are switched off,
    /// and the validation errors described in the module docs.
    #[instrument(skip(self, user, request), fields(user_id = %user.id))]
    pub async fn create_direct_transfer(
        &self,
        user: &User,
        request: &CheckoutRequest,
    ) -> Result<DirectTransferResponse, CheckoutError> {
        let config = self.settings.payment_config(self.pool).await?;
        if !config.transfer_enabled {
            return Err(CheckoutError::MethodDisabled("direct_transfer"));
        }
        let discount = self.settings.transfer_discount(self.pool).await?.effective();

        let lines = self.resolve_lines(user, request).await?;
        let checkout_id = Uuid::new_v4();
        let new_orders = self
            .price_lines(user, request, &lines, checkout_id, PaymentType::DirectTransfer, discount)
            .await?;

        let orders = OrderRepository::new(self.pool)
            .create_batch(&new_orders, None)
            .await?;

        self.finish(user, &lines, &orders).await?;

        let total = orders.iter().map(|o| o.total).sum::<Decimal>();
        info!(%checkout_id, %total, "Direct transfer checkout created");

        Ok(DirectTransferResponse {
            checkout_id,
            orders,
            total,
            bank_details: config.bank,
        })
    }

    async fn resolve_lines(
        &self,
        user: &User,
        request: &CheckoutRequest,
    ) -> Result<Lines, CheckoutError> {
        AddressRepository::new(self.pool)
            .get(user.id, request.address_id)
            .await?
            .ok_or(CheckoutError::AddressNotFound)?;

        let (wanted, from_cart) = match &request.items {
            Some(items) => (merge_items(items)?, false),
            None => {
                let cart = CartRepository::new(self.pool).items(user.id).await?;
                let wanted = cart
                    .into_iter()
                    .map(|item| (item.product.id, item.quantity))
                    .collect::<Vec<_>>();
                (wanted, true)
            }
        };
        if wanted.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let ids: Vec<ProductId> = wanted.iter().map(|(id, _)| *id).collect();
        let products = ProductRepository::new(self.pool).get_many(&ids).await?;

        let items = match_products(&wanted, products)?;
        Ok(Lines { items, from_cart })
    }

    async fn price_lines(
        &self,
        user: &User,
        request: &CheckoutRequest,
        lines: &Lines,
        checkout_id: Uuid,
        payment_type: PaymentType,
        transfer_discount: Percentage,
    ) -> Result<Vec<NewOrder>, CheckoutError> {
        let ids: Vec<ProductId> = lines.items.iter().map(|(p, _)| p.id).collect();
        let offers = ContentRepository::new(self.pool)
            .current_offers_for_many(&ids)
            .await?;

        Ok(build_orders(
            &lines.items,
            &offers,
            transfer_discount,
            &OrderContext {
                checkout_id,
                user,
                request,
                payment_type,
            },
        ))
    }

    async fn finish(&self, user: &User, lines: &Lines, orders: &[Order]) -> Result<(), CheckoutError> {
        if lines.from_cart {
            CartRepository::new(self.pool).clear(user.id).await?;
        }
        self.notifier.order_created(user, orders).await;
        Ok(())
    }
}

struct OrderContext<'a> {
    checkout_id: Uuid,
    user: &'a User,
    request: &'a CheckoutRequest,
    payment_type: PaymentType,
}

/// Merge repeated products and reject non-positive quantities.
fn merge_items(items: &[CheckoutItem]) -> Result<Vec<(ProductId, i32)>, CheckoutError> {
    let mut merged: Vec<(ProductId, i32)> = Vec::with_capacity(items.len());
    for item in items {
        if item.quantity < 1 {
            return Err(CheckoutError::InvalidQuantity);
        }
        match merged.iter_mut().find(|(id, _)| *id == item.product_id) {
            Some((_, quantity)) => {
                *quantity = quantity
                    .checked_add(item.quantity)
                    .ok_or(CheckoutError::InvalidQuantity)?;
            }
            None => merged.push((item.product_id, item.quantity)),
        }
    }
    Ok(merged)
}

/// Pair requested quantities with their products, in request order.
fn match_products(
    wanted: &[(ProductId, i32)],
    products: Vec<Product>,
) -> Result<Vec<(Product, i32)>, CheckoutError> {
    let mut by_id: HashMap<ProductId, Product> =
        products.into_iter().map(|p| (p.id, p)).collect();

    wanted
        .iter()
        .map(|&(id, quantity)| {
            let product = by_id.remove(&id).ok_or(CheckoutError::ProductNotFound(id))?;
            check_purchasable(&product, quantity)?;
            Ok((product, quantity))
        })
        .collect()
}

pub(crate) fn check_purchasable(product: &Product, quantity: i32) -> Result<(), CheckoutError> {
    if product.is_affiliate {
        return Err(CheckoutError::AffiliateProduct(product.name.clone()));
    }
    if !product.is_active {
        return Err(CheckoutError::ProductUnavailable(product.name.clone()));
    }
    if product.stock < quantity {
        return Err(CheckoutError::InsufficientStock {
            product: product.name.clone(),
            available: product.stock,
            requested: quantity,
        });
    }
    Ok(())
}

fn build_orders(
    items: &[(Product, i32)],
    offers: &[SpecialOffer],
    transfer_discount: Percentage,
    ctx: &OrderContext<'_>,
) -> Vec<NewOrder> {
    let now = Utc::now();
    items
        .iter()
        .map(|(product, quantity)| {
            let offer = pricing::best_offer(offers, product, now);
            let price = pricing::price_line(product, *quantity, offer, transfer_discount);
            NewOrder {
                checkout_id: ctx.checkout_id,
                user_id: ctx.user.id,
                product_id: product.id,
                product_name: product.name.clone(),
                address_id: ctx.request.address_id,
                quantity: *quantity,
                unit_price: price.unit_price,
                subtotal: price.subtotal,
                shipping_cost: price.shipping_cost,
                discount_percentage: price.discount_percentage.as_decimal(),
                discount_amount: price.discount_amount,
                total: price.total,
                payment_type: ctx.payment_type,
            }
        })
        .collect()
}

/// Gateway items for the orders of a checkout. Shipping is its own item so
/// the preference total equals the sum of order totals.
fn preference_items(orders: &[NewOrder]) -> Vec<PreferenceItem> {
    let mut items = Vec::with_capacity(orders.len() * 2);
    for order in orders {
        items.push(PreferenceItem {
            id: order.product_id.to_string(),
            title: order.product_name.clone(),
            quantity: order.quantity,
            unit_price: order.unit_price,
            currency_id: CurrencyCode::ARS,
        });
        if order.shipping_cost > Decimal::ZERO {
            items.push(PreferenceItem {
                id: format!("shipping-{}", order.product_id),
                title: format!("Envío: {}", order.product_name),
                quantity: 1,
                unit_price: order.shipping_cost,
                currency_id: CurrencyCode::ARS,
            });
        }
    }
    items
}

fn back_urls(frontend_url: &str) -> BackUrls {
    BackUrls {
        success: format!("{frontend_url}/checkout/success"),
        failure: format!("{frontend_url}/checkout/failure"),
        pending: format!("{frontend_url}/checkout/pending"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use mercadoboom_core::{AddressId, Email, SpecialOfferId, TwoFactorMethod, UserId};

    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn product(id: i32, price: &str, stock: i32) -> Product {
        let now = Utc::now();
        Product {
            id: ProductId::new(id),
            name: format!("Producto {id}"),
            description: String::new(),
            price: dec(price),
            stock,
            category_id: None,
            image_urls: vec![],
            promotion_tag: None,
            is_featured: false,
            is_active: true,
            is_affiliate: false,
            affiliate_url: None,
            is_imported: false,
            import_days: None,
            free_shipping: false,
            shipping_cost: dec("700.00"),
            created_at: now,
            updated_at: now,
        }
    }

    fn user() -> User {
        let now = Utc::now();
        User {
            id: UserId::new(9),
            email: Email::parse("ana@example.com").unwrap(),
            first_name: "Ana".to_string(),
            last_name: "Pérez".to_string(),
            phone: None,
            is_admin: false,
            is_blocked: false,
            two_factor_enabled: false,
            two_factor_method: TwoFactorMethod::Email,
            created_at: now,
            updated_at: now,
        }
    }

    fn item(id: i32, quantity: i32) -> CheckoutItem {
        CheckoutItem {
            product_id: ProductId::new(id),
            quantity,
        }
    }

    #[test]
    fn test_merge_items_sums_duplicates() {
        let merged = merge_items(&[item(1, 2), item(2, 1), item(1, 3)]).unwrap();
        assert_eq!(merged, vec![(ProductId::new(1), 5), (ProductId::new(2), 1)]);
    }

    #[test]
    fn test_merge_items_rejects_zero_quantity() {
        assert!(matches!(
            merge_items(&[item(1, 0)]),
            Err(CheckoutError::InvalidQuantity)
        ));
        assert!(matches!(
            merge_items(&[item(1, i32::MAX), item(1, 1)]),
            Err(CheckoutError::InvalidQuantity)
        ));
    }

    #[test]
    fn test_match_products_reports_missing_product() {
        let wanted = vec![(ProductId::new(1), 1), (ProductId::new(2), 1)];
        let result = match_products(&wanted, vec![product(1, "100", 5)]);
        assert!(matches!(result, Err(CheckoutError::ProductNotFound(id)) if id == ProductId::new(2)));
    }

    #[test]
    fn test_match_products_checks_availability() {
        let wanted = vec![(ProductId::new(1), 6)];
        let result = match_products(&wanted, vec![product(1, "100", 5)]);
        assert!(matches!(
            result,
            Err(CheckoutError::InsufficientStock {
                available: 5,
                requested: 6,
                ..
            })
        ));

        let mut inactive = product(1, "100", 5);
        inactive.is_active = false;
        assert!(matches!(
            match_products(&[(ProductId::new(1), 1)], vec![inactive]),
            Err(CheckoutError::ProductUnavailable(_))
        ));

        let mut affiliate = product(1, "100", 5);
        affiliate.is_affiliate = true;
        affiliate.affiliate_url = Some("https://partner.test/p/1".to_string());
        assert!(matches!(
            match_products(&[(ProductId::new(1), 1)], vec![affiliate]),
            Err(CheckoutError::AffiliateProduct(_))
        ));
    }

    #[test]
    fn test_build_orders_applies_offer_and_discount() {
        let now = Utc::now();
        let offer = SpecialOffer {
            id: SpecialOfferId::new(1),
            product_id: ProductId::new(1),
            title: "Hot Sale".to_string(),
            discount_percentage: Percentage::new(dec("10")).unwrap(),
            starts_at: None,
            ends_at: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        let user = user();
        let request = CheckoutRequest {
            address_id: AddressId::new(3),
            items: None,
        };
        let ctx = OrderContext {
            checkout_id: Uuid::new_v4(),
            user: &user,
            request: &request,
            payment_type: PaymentType::DirectTransfer,
        };
        let items = vec![(product(1, "1000.00", 5), 2), (product(2, "500.00", 5), 1)];

        let orders = build_orders(&items, &[offer], Percentage::new(dec("5")).unwrap(), &ctx);

        assert_eq!(orders.len(), 2);
        assert!(orders.iter().all(|o| o.checkout_id == ctx.checkout_id));
        // 900 * 2 = 1800, 5% = 90, + 700 shipping
        assert_eq!(orders[0].unit_price, dec("900.00"));
        assert_eq!(orders[0].discount_amount, dec("90.00"));
        assert_eq!(orders[0].total, dec("2410.00"));
        assert_eq!(orders[0].discount_percentage, dec("5"));
        // no offer on product 2
        assert_eq!(orders[1].unit_price, dec("500.00"));
        assert_eq!(orders[1].address_id, AddressId::new(3));
    }

    #[test]
    fn test_preference_items_include_shipping() {
        let user = user();
        let request = CheckoutRequest {
            address_id: AddressId::new(3),
            items: None,
        };
        let ctx = OrderContext {
            checkout_id: Uuid::new_v4(),
            user: &user,
            request: &request,
            payment_type: PaymentType::Mercadopago,
        };
        let mut free = product(5, "2000.00", 5);
        free.free_shipping = true;
        let orders = build_orders(
            &[(product(4, "1000.00", 5), 2), (free, 1)],
            &[],
            Percentage::ZERO,
            &ctx,
        );

        let items = preference_items(&orders);
        assert_eq!(items.len(), 3);
        assert_eq!(items[1].id, "shipping-4");
        let gateway_total: Decimal = items
            .iter()
            .map(|i| i.unit_price * Decimal::from(i.quantity))
            .sum();
        let orders_total: Decimal = orders.iter().map(|o| o.total).sum();
        assert_eq!(gateway_total, orders_total);
        assert_eq!(orders_total, dec("4700.00"));
    }

    #[test]
    fn test_back_urls() {
        let urls = back_urls("https://mercadoboom.com.ar");
        assert_eq!(urls.success, "https://mercadoboom.com.ar/checkout/success");
        assert_eq!(urls.pending, "https://mercadoboom.com.ar/checkout/pending");
    }
}
