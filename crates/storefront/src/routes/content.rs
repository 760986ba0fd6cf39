//! Public storefront content: banners and running offers.

use axum::{
    Json,
    extract::State,
    http::header::CACHE_CONTROL,
    response::IntoResponse,
};
use tracing::instrument;

use crate::db::ContentRepository;
use crate::error::Result;
use crate::models::content::OfferWithProduct;
use crate::state::AppState;

const PUBLIC_CACHE: &str = "public, max-age=60";

/// GET /api/banners
///
/// Active banners by position.
#[instrument(skip(state))]
pub async fn banners(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let banners = ContentRepository::new(state.pool()).banners(false).await?;
    Ok(([(CACHE_CONTROL, PUBLIC_CACHE)], Json(banners)))
}

/// GET /api/offers
///
/// Offers running right now, each with its product.
#[instrument(skip(state))]
pub async fn offers(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let offers: Vec<OfferWithProduct> = ContentRepository::new(state.pool())
        .current_offers_with_products()
        .await?
        .into_iter()
        .map(|(offer, product)| OfferWithProduct { offer, product })
        .collect();
    Ok(([(CACHE_CONTROL, PUBLIC_CACHE)], Json(offers)))
}
