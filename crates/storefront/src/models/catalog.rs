//! Catalog types: categories and products.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use mercadoboom_core::{CategoryId, ProductId};

use super::content::SpecialOffer;

/// Maximum page size for product listings.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Default page size for product listings.
pub const DEFAULT_PAGE_SIZE: i64 = 24;

/// A product category.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Category create/update body.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryInput {
    pub name: String,
    /// Derived from the name when omitted.
    pub slug: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

impl CategoryInput {
    /// Validated slug: the given one, or one derived from the name.
    ///
    /// # Errors
    ///
    /// Returns a message when the name is blank or the slug is empty.
    pub fn normalized_slug(&self) -> Result<String, String> {
        if self.name.trim().is_empty() {
            return Err("name is required".to_string());
        }
        let slug = slugify(self.slug.as_deref().unwrap_or(&self.name));
        if slug.is_empty() {
            return Err("slug must contain letters or digits".to_string());
        }
        Ok(slug)
    }
}

/// Lowercase ASCII slug: letters and digits, words joined by `-`.
#[must_use]
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    for c in input.trim().chars() {
        let c = match c {
            'á' | 'à' | 'ä' | 'Á' => 'a',
            'é' | 'è' | 'ë' | 'É' => 'e',
            'í' | 'ì' | 'ï' | 'Í' => 'i',
            'ó' | 'ò' | 'ö' | 'Ó' => 'o',
            'ú' | 'ù' | 'ü' | 'Ú' => 'u',
            'ñ' | 'Ñ' => 'n',
            other => other,
        };
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

/// A catalog item.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub stock: i32,
    pub category_id: Option<CategoryId>,
    pub image_urls: Vec<String>,
    pub promotion_tag: Option<String>,
    pub is_featured: bool,
    pub is_active: bool,
    pub is_affiliate: bool,
    pub affiliate_url: Option<String>,
    pub is_imported: bool,
    pub import_days: Option<i32>,
    pub free_shipping: bool,
    pub shipping_cost: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Whether the product can be added to a cart or checked out.
    #[must_use]
    pub const fn is_purchasable(&self) -> bool {
        self.is_active && !self.is_affiliate
    }
}

/// Product create/update body.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub stock: i32,
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub image_urls: Vec<String>,
    pub promotion_tag: Option<String>,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_affiliate: bool,
    pub affiliate_url: Option<String>,
    #[serde(default)]
    pub is_imported: bool,
    pub import_days: Option<i32>,
    #[serde(default)]
    pub free_shipping: bool,
    #[serde(default)]
    pub shipping_cost: Decimal,
}

const fn default_true() -> bool {
    true
}

impl ProductInput {
    /// Check field-level rules.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name is required".to_string());
        }
        if self.price <= Decimal::ZERO {
            return Err("price must be greater than zero".to_string());
        }
        if self.stock < 0 {
            return Err("stock cannot be negative".to_string());
        }
        if self.shipping_cost < Decimal::ZERO {
            return Err("shipping_cost cannot be negative".to_string());
        }
        if self.is_affiliate
            && self
                .affiliate_url
                .as_deref()
                .is_none_or(|url| url.trim().is_empty())
        {
            return Err("affiliate products need an affiliate_url".to_string());
        }
        if self.import_days.is_some_and(|days| days < 0) {
            return Err("import_days cannot be negative".to_string());
        }
        Ok(())
    }
}

/// Sort order for product listings.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
}

impl ProductSort {
    /// SQL `ORDER BY` clause.
    #[must_use]
    pub const fn order_by(self) -> &'static str {
        match self {
            Self::Newest => "p.created_at DESC, p.id DESC",
            Self::PriceAsc => "p.price ASC, p.id ASC",
            Self::PriceDesc => "p.price DESC, p.id DESC",
        }
    }
}

/// Query parameters for product listings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    pub category_id: Option<CategoryId>,
    /// Filter by category slug (alternative to `category_id`).
    pub category: Option<String>,
    pub search: Option<String>,
    pub promotion_tag: Option<String>,
    pub featured: Option<bool>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    #[serde(default)]
    pub sort: ProductSort,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    /// Admin listings include inactive products.
    #[serde(skip)]
    pub include_inactive: bool,
}

impl ProductFilter {
    /// Page size clamped to `1..=MAX_PAGE_SIZE`.
    #[must_use]
    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    /// Offset, never negative.
    #[must_use]
    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// A page of results with the total match count.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Product with its current offer and the price a buyer pays.
#[derive(Debug, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub active_offer: Option<SpecialOffer>,
    pub effective_price: Decimal,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn input() -> ProductInput {
        serde_json::from_value(serde_json::json!({
            "name": "Auriculares",
            "price": "15999.90",
            "stock": 4
        }))
        .unwrap()
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Electrónica y Audio"), "electronica-y-audio");
        assert_eq!(slugify("  Niños & Bebés  "), "ninos-bebes");
        assert_eq!(slugify("---"), "");
    }

    #[test]
    fn test_category_slug_defaults_to_name() {
        let input = CategoryInput {
            name: "Hogar y Jardín".to_string(),
            slug: None,
            description: None,
            image_url: None,
        };
        assert_eq!(input.normalized_slug().unwrap(), "hogar-y-jardin");
    }

    #[test]
    fn test_product_input_defaults() {
        let input = input();
        assert!(input.is_active);
        assert!(!input.free_shipping);
        assert_eq!(input.shipping_cost, Decimal::ZERO);
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_product_input_rejects_bad_values() {
        let mut bad = input();
        bad.price = Decimal::ZERO;
        assert!(bad.validate().is_err());

        let mut bad = input();
        bad.stock = -1;
        assert!(bad.validate().is_err());

        let mut bad = input();
        bad.is_affiliate = true;
        assert!(bad.validate().is_err());
        bad.affiliate_url = Some("https://partner.example/p/1".to_string());
        assert!(bad.validate().is_ok());
    }

    #[test]
    fn test_filter_limit_is_clamped() {
        let filter = ProductFilter {
            limit: Some(1000),
            offset: Some(-5),
            ..Default::default()
        };
        assert_eq!(filter.limit(), MAX_PAGE_SIZE);
        assert_eq!(filter.offset(), 0);
        assert_eq!(ProductFilter::default().limit(), DEFAULT_PAGE_SIZE);
    }
}
