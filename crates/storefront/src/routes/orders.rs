//! Customer order route handlers.

use axum::{
    Json,
    extract::{Path, State},
};
use tracing::instrument;

use mercadoboom_core::OrderId;

use crate::db::OrderRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::order::{AttachReceiptRequest, Order};
use crate::services::orders::OrderService;
use crate::state::AppState;

/// GET /api/orders
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn index(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Vec<Order>>> {
    let orders = OrderRepository::new(state.pool())
        .list_for_user(user.id)
        .await?;
    Ok(Json(orders))
}

/// GET /api/orders/{id}
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn show(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    OrderRepository::new(state.pool())
        .get_for_user(user.id, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))
}

/// POST /api/orders/{id}/cancel
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn cancel(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    let order = OrderService::new(state.pool(), state.notifier())
        .cancel_for_user(user.id, id)
        .await?;
    Ok(Json(order))
}

/// PUT /api/orders/{id}/receipt
///
/// Attach the URL of an uploaded transfer receipt.
#[instrument(skip(state, user, request), fields(user_id = %user.id))]
pub async fn attach_receipt(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    Json(request): Json<AttachReceiptRequest>,
) -> Result<Json<Order>> {
    let order = OrderService::new(state.pool(), state.notifier())
        .attach_receipt(user.id, id, &request.receipt_url)
        .await?;
    Ok(Json(order))
}
