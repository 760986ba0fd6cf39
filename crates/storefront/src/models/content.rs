//! Banners and special offers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mercadoboom_core::{BannerId, Percentage, ProductId, SpecialOfferId};

use super::catalog::Product;

/// A homepage banner.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Banner {
    pub id: BannerId,
    pub title: String,
    pub subtitle: Option<String>,
    pub image_url: String,
    pub link_url: Option<String>,
    pub position: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Banner create/update body.
#[derive(Debug, Clone, Deserialize)]
pub struct BannerInput {
    pub title: String,
    pub subtitle: Option<String>,
    pub image_url: String,
    pub link_url: Option<String>,
    #[serde(default)]
    pub position: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl BannerInput {
    /// # Errors
    ///
    /// Returns a message when a required field is blank.
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("title is required".to_string());
        }
        if self.image_url.trim().is_empty() {
            return Err("image_url is required".to_string());
        }
        Ok(())
    }
}

/// A time-boxed percentage discount on one product.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SpecialOffer {
    pub id: SpecialOfferId,
    pub product_id: ProductId,
    pub title: String,
    pub discount_percentage: Percentage,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SpecialOffer {
    /// Active and inside its window (`starts_at <= now < ends_at`, open ends allowed).
    #[must_use]
    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        self.is_active
            && self.starts_at.is_none_or(|start| start <= now)
            && self.ends_at.is_none_or(|end| now < end)
    }
}

/// Special offer create/update body.
#[derive(Debug, Clone, Deserialize)]
pub struct SpecialOfferInput {
    pub product_id: ProductId,
    pub title: String,
    pub discount_percentage: Percentage,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl SpecialOfferInput {
    /// # Errors
    ///
    /// Returns a message when the title is blank, the discount is zero or the
    /// window is empty.
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("title is required".to_string());
        }
        if self.discount_percentage.is_zero() {
            return Err("discount_percentage must be greater than zero".to_string());
        }
        if let (Some(start), Some(end)) = (self.starts_at, self.ends_at)
            && start >= end
        {
            return Err("starts_at must be before ends_at".to_string());
        }
        Ok(())
    }
}

/// Offer with its product, for the public offers listing.
#[derive(Debug, Serialize)]
pub struct OfferWithProduct {
    #[serde(flatten)]
    pub offer: SpecialOffer,
    pub product: Product,
}

const fn default_true() -> bool {
    true
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn offer(starts: Option<i64>, ends: Option<i64>, active: bool) -> SpecialOffer {
        let now = Utc::now();
        SpecialOffer {
            id: SpecialOfferId::new(1),
            product_id: ProductId::new(1),
            title: "Hot Sale".to_string(),
            discount_percentage: Percentage::new(rust_decimal::Decimal::TEN).unwrap(),
            starts_at: starts.map(|h| now + Duration::hours(h)),
            ends_at: ends.map(|h| now + Duration::hours(h)),
            is_active: active,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_offer_window() {
        let now = Utc::now();
        assert!(offer(None, None, true).is_current(now));
        assert!(offer(Some(-1), Some(1), true).is_current(now));
        assert!(!offer(Some(1), None, true).is_current(now));
        assert!(!offer(None, Some(-1), true).is_current(now));
        assert!(!offer(None, None, false).is_current(now));
    }

    #[test]
    fn test_offer_input_validation() {
        let mut input: SpecialOfferInput = serde_json::from_value(serde_json::json!({
            "product_id": 3,
            "title": "Cyber Monday",
            "discount_percentage": "20"
        }))
        .unwrap();
        assert!(input.is_active);
        assert!(input.validate().is_ok());

        input.discount_percentage = Percentage::ZERO;
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_offer_input_rejects_percentage_over_hundred() {
        let result: Result<SpecialOfferInput, _> = serde_json::from_value(serde_json::json!({
            "product_id": 3,
            "title": "Too good",
            "discount_percentage": "150"
        }));
        assert!(result.is_err());
    }
}
