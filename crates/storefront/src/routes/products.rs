//! Public catalog route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::Utc;
use tracing::instrument;

use mercadoboom_core::ProductId;

use crate::db::{CategoryRepository, ContentRepository, ProductRepository};
use crate::error::{AppError, Result};
use crate::models::catalog::{Category, Page, Product, ProductDetail, ProductFilter};
use crate::models::content::SpecialOffer;
use crate::services::pricing::{best_offer, effective_unit_price};
use crate::state::AppState;

/// GET /api/products
///
/// Active products only; inactive ones are hidden even when filtered for.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(mut filter): Query<ProductFilter>,
) -> Result<Json<Page<Product>>> {
    filter.include_inactive = false;
    let page = ProductRepository::new(state.pool()).list(&filter).await?;
    Ok(Json(page))
}

/// GET /api/products/{id}
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<ProductDetail>> {
    let product = ProductRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;

    let offers = ContentRepository::new(state.pool())
        .current_offers_for(id)
        .await?;

    Ok(Json(product_detail(product, &offers)))
}

/// Attach the best running offer and the resulting price.
pub(crate) fn product_detail(product: Product, offers: &[SpecialOffer]) -> ProductDetail {
    let active_offer = best_offer(offers, &product, Utc::now()).cloned();
    let effective_price = effective_unit_price(&product, active_offer.as_ref());
    ProductDetail {
        product,
        active_offer,
        effective_price,
    }
}

/// GET /api/categories
#[instrument(skip(state))]
pub async fn categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>> {
    let categories = CategoryRepository::new(state.pool()).list().await?;
    Ok(Json(categories))
}

/// GET /api/categories/{slug}
#[instrument(skip(state))]
pub async fn category(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Category>> {
    CategoryRepository::new(state.pool())
        .get_by_slug(&slug)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("category {slug}")))
}
