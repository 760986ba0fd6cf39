//! Admin product and category management.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use mercadoboom_core::{CategoryId, ProductId};

use crate::db::products::ProductRemoval;
use crate::db::{CategoryRepository, ProductRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::catalog::{Category, CategoryInput, Page, Product, ProductFilter, ProductInput};
use crate::state::AppState;

/// Stock correction body.
#[derive(Debug, Deserialize)]
pub struct SetStockRequest {
    pub stock: i32,
}

/// Result of a product delete.
#[derive(Debug, Serialize)]
pub struct DeleteProductResponse {
    /// `false` when the product was only deactivated because orders use it.
    pub deleted: bool,
}

// =============================================================================
// Products
// =============================================================================

/// GET /api/admin/products
///
/// Same filters as the public listing, inactive products included.
#[instrument(skip(state, _admin))]
pub async fn products(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Query(mut filter): Query<ProductFilter>,
) -> Result<Json<Page<Product>>> {
    filter.include_inactive = true;
    Ok(Json(ProductRepository::new(state.pool()).list(&filter).await?))
}

/// GET /api/admin/products/{id}
#[instrument(skip(state, _admin))]
pub async fn product(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>> {
    ProductRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))
}

/// POST /api/admin/products
#[instrument(skip(state, admin, input), fields(admin_id = %admin.id))]
pub async fn create_product(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(input): Json<ProductInput>,
) -> Result<(StatusCode, Json<Product>)> {
    input.validate().map_err(AppError::BadRequest)?;
    let product = ProductRepository::new(state.pool()).create(&input).await?;
    info!(product_id = %product.id, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}

/// PUT /api/admin/products/{id}
#[instrument(skip(state, admin, input), fields(admin_id = %admin.id))]
pub async fn update_product(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Json(input): Json<ProductInput>,
) -> Result<Json<Product>> {
    input.validate().map_err(AppError::BadRequest)?;
    let product = ProductRepository::new(state.pool()).update(id, &input).await?;
    info!(product_id = %id, "Product updated");
    Ok(Json(product))
}

/// PUT /api/admin/products/{id}/stock
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn set_stock(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Json(request): Json<SetStockRequest>,
) -> Result<Json<Product>> {
    if request.stock < 0 {
        return Err(AppError::BadRequest("stock cannot be negative".to_string()));
    }
    let product = ProductRepository::new(state.pool())
        .set_stock(id, request.stock)
        .await?;
    info!(product_id = %id, stock = request.stock, "Stock corrected");
    Ok(Json(product))
}

/// DELETE /api/admin/products/{id}
///
/// Products that orders still reference are deactivated instead.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn delete_product(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<DeleteProductResponse>> {
    let removal = ProductRepository::new(state.pool()).delete(id).await?;
    info!(product_id = %id, ?removal, "Product removed");
    Ok(Json(DeleteProductResponse {
        deleted: removal == ProductRemoval::Deleted,
    }))
}

// =============================================================================
// Categories
// =============================================================================

/// POST /api/admin/categories
#[instrument(skip(state, admin, input), fields(admin_id = %admin.id))]
pub async fn create_category(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(input): Json<CategoryInput>,
) -> Result<(StatusCode, Json<Category>)> {
    let slug = input.normalized_slug().map_err(AppError::BadRequest)?;
    let category = CategoryRepository::new(state.pool())
        .create(&input, &slug)
        .await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// PUT /api/admin/categories/{id}
#[instrument(skip(state, admin, input), fields(admin_id = %admin.id))]
pub async fn update_category(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<CategoryId>,
    Json(input): Json<CategoryInput>,
) -> Result<Json<Category>> {
    let slug = input.normalized_slug().map_err(AppError::BadRequest)?;
    let category = CategoryRepository::new(state.pool())
        .update(id, &input, &slug)
        .await?;
    Ok(Json(category))
}

/// DELETE /api/admin/categories/{id}
///
/// Products in the category are kept and left uncategorized.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn delete_category(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<CategoryId>,
) -> Result<StatusCode> {
    CategoryRepository::new(state.pool()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
