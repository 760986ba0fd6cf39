//! Address book route handlers.
//!
//! Addresses belong to one user; another user's address is reported as
//! missing rather than forbidden.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::instrument;

use mercadoboom_core::AddressId;

use crate::db::AddressRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::address::{Address, AddressInput};
use crate::state::AppState;

fn not_found(id: AddressId) -> AppError {
    AppError::NotFound(format!("address {id}"))
}

/// GET /api/addresses
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn index(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Vec<Address>>> {
    let addresses = AddressRepository::new(state.pool()).list(user.id).await?;
    Ok(Json(addresses))
}

/// GET /api/addresses/{id}
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn show(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<AddressId>,
) -> Result<Json<Address>> {
    AddressRepository::new(state.pool())
        .get(user.id, id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found(id))
}

/// POST /api/addresses
#[instrument(skip(state, user, input), fields(user_id = %user.id))]
pub async fn create(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(input): Json<AddressInput>,
) -> Result<(StatusCode, Json<Address>)> {
    input.validate().map_err(AppError::BadRequest)?;
    let address = AddressRepository::new(state.pool())
        .create(user.id, &input)
        .await?;
    Ok((StatusCode::CREATED, Json(address)))
}

/// PUT /api/addresses/{id}
#[instrument(skip(state, user, input), fields(user_id = %user.id))]
pub async fn update(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<AddressId>,
    Json(input): Json<AddressInput>,
) -> Result<Json<Address>> {
    input.validate().map_err(AppError::BadRequest)?;
    let address = AddressRepository::new(state.pool())
        .update(user.id, id, &input)
        .await?;
    Ok(Json(address))
}

/// PUT /api/addresses/{id}/default
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn set_default(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<AddressId>,
) -> Result<Json<Address>> {
    let address = AddressRepository::new(state.pool())
        .set_default(user.id, id)
        .await?;
    Ok(Json(address))
}

/// DELETE /api/addresses/{id}
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<AddressId>,
) -> Result<StatusCode> {
    AddressRepository::new(state.pool())
        .delete(user.id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
