//! Price computation for cart lines and checkout orders.
//!
//! ```text
//! unit_price      = price - best current offer %
//! subtotal        = unit_price * quantity
//! discount_amount = subtotal * transfer discount %   (direct transfer only)
//! shipping        = 0 if free_shipping else product.shipping_cost (per line)
//! total           = subtotal - discount_amount + shipping
//! ```
//!
//! Every derived amount is rounded with [`round_money`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use mercadoboom_core::{Percentage, percentage_of, round_money};

use crate::models::catalog::Product;
use crate::models::content::SpecialOffer;

/// Priced line of a checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinePrice {
    pub unit_price: Decimal,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub discount_percentage: Percentage,
    pub discount_amount: Decimal,
    pub total: Decimal,
}

/// The current offer with the largest discount for a product.
#[must_use]
pub fn best_offer<'o>(
    offers: &'o [SpecialOffer],
    product: &Product,
    now: DateTime<Utc>,
) -> Option<&'o SpecialOffer> {
    offers
        .iter()
        .filter(|o| o.product_id == product.id && o.is_current(now))
        .max_by_key(|o| o.discount_percentage)
}

/// Product price after its offer, if any.
#[must_use]
pub fn effective_unit_price(product: &Product, offer: Option<&SpecialOffer>) -> Decimal {
    let price = round_money(product.price);
    offer.map_or(price, |o| {
        round_money(price - percentage_of(price, o.discount_percentage))
    })
}

/// Shipping charged once for a line of this product.
#[must_use]
pub fn line_shipping(product: &Product) -> Decimal {
    if product.free_shipping {
        Decimal::ZERO
    } else {
        round_money(product.shipping_cost)
    }
}

/// Price a checkout line.
///
/// `transfer_discount` is the direct-transfer discount ([`Percentage::ZERO`]
/// for gateway payments); it applies to the subtotal only, never to shipping.
#[must_use]
pub fn price_line(
    product: &Product,
    quantity: i32,
    offer: Option<&SpecialOffer>,
    transfer_discount: Percentage,
) -> LinePrice {
    let unit_price = effective_unit_price(product, offer);
    let subtotal = round_money(unit_price * Decimal::from(quantity));
    let discount_amount = percentage_of(subtotal, transfer_discount);
    let shipping_cost = line_shipping(product);
    let total = round_money(subtotal - discount_amount + shipping_cost);

    LinePrice {
        unit_price,
        subtotal,
        shipping_cost,
        discount_percentage: transfer_discount,
        discount_amount,
        total,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;
    use mercadoboom_core::{ProductId, SpecialOfferId};

    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn product(price: &str, shipping: &str, free_shipping: bool) -> Product {
        let now = Utc::now();
        Product {
            id: ProductId::new(1),
            name: "Mate de calabaza".to_string(),
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
            free_shipping,
            shipping_cost: dec(shipping),
            created_at: now,
            updated_at: now,
        }
    }

    fn offer(id: i32, pct: &str, active: bool, ends_in_hours: Option<i64>) -> SpecialOffer {
        let now = Utc::now();
        SpecialOffer {
            id: SpecialOfferId::new(id),
            product_id: ProductId::new(1),
            title: format!("Oferta {id}"),
            discount_percentage: Percentage::new(dec(pct)).unwrap(),
            starts_at: None,
            ends_at: ends_in_hours.map(|h| now + Duration::hours(h)),
            is_active: active,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_plain_line() {
        let p = product("1000.00", "500.00", false);
        let line = price_line(&p, 3, None, Percentage::ZERO);
        assert_eq!(line.unit_price, dec("1000.00"));
        assert_eq!(line.subtotal, dec("3000.00"));
        assert_eq!(line.shipping_cost, dec("500.00"));
        assert_eq!(line.discount_amount, Decimal::ZERO);
        assert_eq!(line.total, dec("3500.00"));
    }

    #[test]
    fn test_free_shipping() {
        let p = product("1000.00", "500.00", true);
        let line = price_line(&p, 1, None, Percentage::ZERO);
        assert_eq!(line.shipping_cost, Decimal::ZERO);
        assert_eq!(line.total, dec("1000.00"));
    }

    #[test]
    fn test_offer_lowers_unit_price() {
        let p = product("999.99", "0", true);
        let o = offer(1, "15", true, None);
        // 999.99 * 0.15 = 149.9985 -> 150.00
        assert_eq!(effective_unit_price(&p, Some(&o)), dec("849.99"));
    }

    #[test]
    fn test_transfer_discount_excludes_shipping() {
        let p = product("2000.00", "800.00", false);
        let pct = Percentage::new(dec("10")).unwrap();
        let line = price_line(&p, 2, None, pct);
        assert_eq!(line.subtotal, dec("4000.00"));
        assert_eq!(line.discount_amount, dec("400.00"));
        assert_eq!(line.total, dec("4400.00"));
        assert_eq!(line.discount_percentage, pct);
    }

    #[test]
    fn test_offer_and_transfer_discount_stack() {
        let p = product("1000.00", "100.00", false);
        let o = offer(1, "20", true, None);
        let line = price_line(&p, 1, Some(&o), Percentage::new(dec("5")).unwrap());
        assert_eq!(line.unit_price, dec("800.00"));
        assert_eq!(line.discount_amount, dec("40.00"));
        assert_eq!(line.total, dec("860.00"));
    }

    #[test]
    fn test_rounding_midpoint_away_from_zero() {
        let p = product("0.05", "0", true);
        let line = price_line(&p, 1, None, Percentage::new(dec("50")).unwrap());
        // 0.05 * 0.5 = 0.025 -> 0.03
        assert_eq!(line.discount_amount, dec("0.03"));
        assert_eq!(line.total, dec("0.02"));
    }

    #[test]
    fn test_best_offer_picks_largest_current_discount() {
        let p = product("100", "0", true);
        let now = Utc::now();
        let offers = vec![
            offer(1, "10", true, None),
            offer(2, "30", false, None),
            offer(3, "25", true, Some(1)),
            offer(4, "40", true, Some(-1)),
        ];
        let best = best_offer(&offers, &p, now).unwrap();
        assert_eq!(best.id, SpecialOfferId::new(3));
    }

    #[test]
    fn test_best_offer_ignores_other_products() {
        let mut p = product("100", "0", true);
        p.id = ProductId::new(2);
        let offers = vec![offer(1, "10", true, None)];
        assert!(best_offer(&offers, &p, Utc::now()).is_none());
    }
}
