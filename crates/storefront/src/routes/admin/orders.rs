//! Admin order management.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Serialize;
use tracing::instrument;

use mercadoboom_core::OrderId;

use crate::db::{AddressRepository, OrderRepository, UserRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::address::Address;
use crate::models::catalog::Page;
use crate::models::order::{Order, OrderFilter, UpdateOrderStatusRequest, VerifyTransferRequest};
use crate::models::user::User;
use crate::services::orders::OrderService;
use crate::state::AppState;

/// An order with its customer and shipping address.
#[derive(Debug, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub customer: Option<User>,
    pub address: Option<Address>,
}

/// GET /api/admin/orders
#[instrument(skip(state, _admin))]
pub async fn index(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Query(filter): Query<OrderFilter>,
) -> Result<Json<Page<Order>>> {
    Ok(Json(OrderRepository::new(state.pool()).list(&filter).await?))
}

/// GET /api/admin/orders/{id}
#[instrument(skip(state, _admin))]
pub async fn show(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderDetail>> {
    let order = OrderRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))?;

    let customer = UserRepository::new(state.pool())
        .get_by_id(order.user_id)
        .await?;
    let address = match order.address_id {
        Some(address_id) => {
            AddressRepository::new(state.pool())
                .get_any(address_id)
                .await?
        }
        None => None,
    };

    Ok(Json(OrderDetail {
        order,
        customer,
        address,
    }))
}

/// PUT /api/admin/orders/{id}/status
///
/// Moves the order through the state machine; invalid moves are 409.
#[instrument(skip(state, admin, request), fields(admin_id = %admin.id))]
pub async fn update_status(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    Json(request): Json<UpdateOrderStatusRequest>,
) -> Result<Json<Order>> {
    let order = OrderService::new(state.pool(), state.notifier())
        .update_status(id, &request)
        .await?;
    Ok(Json(order))
}

/// POST /api/admin/orders/{id}/verify-transfer
#[instrument(skip(state, admin, request), fields(admin_id = %admin.id))]
pub async fn verify_transfer(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    Json(request): Json<VerifyTransferRequest>,
) -> Result<Json<Order>> {
    let order = OrderService::new(state.pool(), state.notifier())
        .verify_transfer(id, &request)
        .await?;
    Ok(Json(order))
}
