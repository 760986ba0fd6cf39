//! Admin payment settings.

use axum::{Json, extract::State};
use tracing::{info, instrument};

use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::models::settings::{PaymentConfig, TransferDiscountConfig};
use crate::state::AppState;

/// GET /api/admin/settings/payment
#[instrument(skip(state, _admin))]
pub async fn payment_config(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<PaymentConfig>> {
    Ok(Json(state.settings().payment_config(state.pool()).await?))
}

/// PUT /api/admin/settings/payment
#[instrument(skip(state, admin, config), fields(admin_id = %admin.id))]
pub async fn update_payment_config(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(config): Json<PaymentConfig>,
) -> Result<Json<PaymentConfig>> {
    state
        .settings()
        .set_payment_config(state.pool(), &config)
        .await?;
    info!(
        mercadopago_enabled = config.mercadopago_enabled,
        transfer_enabled = config.transfer_enabled,
        "Payment config updated"
    );
    Ok(Json(config))
}

/// GET /api/admin/settings/transfer-discount
#[instrument(skip(state, _admin))]
pub async fn transfer_discount(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<TransferDiscountConfig>> {
    Ok(Json(state.settings().transfer_discount(state.pool()).await?))
}

/// PUT /api/admin/settings/transfer-discount
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn update_transfer_discount(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(config): Json<TransferDiscountConfig>,
) -> Result<Json<TransferDiscountConfig>> {
    state
        .settings()
        .set_transfer_discount(state.pool(), &config)
        .await?;
    info!(enabled = config.enabled, percentage = %config.percentage, "Transfer discount updated");
    Ok(Json(config))
}
