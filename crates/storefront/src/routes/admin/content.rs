//! Admin banners and special offers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::{info, instrument};

use mercadoboom_core::{BannerId, SpecialOfferId};

use crate::db::{ContentRepository, ProductRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::content::{Banner, BannerInput, SpecialOffer, SpecialOfferInput};
use crate::state::AppState;

// =============================================================================
// Banners
// =============================================================================

/// GET /api/admin/banners
///
/// All banners, inactive included.
#[instrument(skip(state, _admin))]
pub async fn banners(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<Banner>>> {
    Ok(Json(ContentRepository::new(state.pool()).banners(true).await?))
}

/// POST /api/admin/banners
#[instrument(skip(state, admin, input), fields(admin_id = %admin.id))]
pub async fn create_banner(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(input): Json<BannerInput>,
) -> Result<(StatusCode, Json<Banner>)> {
    input.validate().map_err(AppError::BadRequest)?;
    let banner = ContentRepository::new(state.pool())
        .create_banner(&input)
        .await?;
    Ok((StatusCode::CREATED, Json(banner)))
}

/// PUT /api/admin/banners/{id}
#[instrument(skip(state, admin, input), fields(admin_id = %admin.id))]
pub async fn update_banner(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<BannerId>,
    Json(input): Json<BannerInput>,
) -> Result<Json<Banner>> {
    input.validate().map_err(AppError::BadRequest)?;
    let banner = ContentRepository::new(state.pool())
        .update_banner(id, &input)
        .await?;
    Ok(Json(banner))
}

/// DELETE /api/admin/banners/{id}
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn delete_banner(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<BannerId>,
) -> Result<StatusCode> {
    ContentRepository::new(state.pool()).delete_banner(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Special offers
// =============================================================================

async fn validate_offer(state: &AppState, input: &SpecialOfferInput) -> Result<()> {
    input.validate().map_err(AppError::BadRequest)?;
    if ProductRepository::new(state.pool())
        .get_by_id(input.product_id)
        .await?
        .is_none()
    {
        return Err(AppError::BadRequest(format!(
            "product {} does not exist",
            input.product_id
        )));
    }
    Ok(())
}

/// GET /api/admin/offers
///
/// All offers, including expired and scheduled ones.
#[instrument(skip(state, _admin))]
pub async fn offers(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<SpecialOffer>>> {
    Ok(Json(ContentRepository::new(state.pool()).offers().await?))
}

/// GET /api/admin/offers/{id}
#[instrument(skip(state, _admin))]
pub async fn offer(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<SpecialOfferId>,
) -> Result<Json<SpecialOffer>> {
    ContentRepository::new(state.pool())
        .get_offer(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("offer {id}")))
}

/// POST /api/admin/offers
#[instrument(skip(state, admin, input), fields(admin_id = %admin.id))]
pub async fn create_offer(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(input): Json<SpecialOfferInput>,
) -> Result<(StatusCode, Json<SpecialOffer>)> {
    validate_offer(&state, &input).await?;
    let offer = ContentRepository::new(state.pool())
        .create_offer(&input)
        .await?;
    info!(offer_id = %offer.id, product_id = %offer.product_id, "Offer created");
    Ok((StatusCode::CREATED, Json(offer)))
}

/// PUT /api/admin/offers/{id}
#[instrument(skip(state, admin, input), fields(admin_id = %admin.id))]
pub async fn update_offer(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<SpecialOfferId>,
    Json(input): Json<SpecialOfferInput>,
) -> Result<Json<SpecialOffer>> {
    validate_offer(&state, &input).await?;
    let offer = ContentRepository::new(state.pool())
        .update_offer(id, &input)
        .await?;
    Ok(Json(offer))
}

/// DELETE /api/admin/offers/{id}
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn delete_offer(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<SpecialOfferId>,
) -> Result<StatusCode> {
    ContentRepository::new(state.pool()).delete_offer(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
