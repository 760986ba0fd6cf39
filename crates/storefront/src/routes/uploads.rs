//! Presigned upload URL handlers.
//!
//! Customers may only upload transfer receipts for their own direct-transfer
//! orders; catalog and banner images are admin-only.

use axum::{Json, extract::State};
use serde::Deserialize;
use tracing::instrument;

use mercadoboom_core::{OrderId, PaymentType};

use crate::db::OrderRepository;
use crate::error::{AppError, Result};
use crate::middleware::{RequireAdmin, RequireAuth};
use crate::services::storage::{
    ObjectStorage, PresignedUpload, StorageError, UploadKind, UploadRequest,
};
use crate::state::AppState;

/// Receipt upload body.
#[derive(Debug, Deserialize)]
pub struct ReceiptUploadRequest {
    pub order_id: OrderId,
    pub content_type: String,
}

fn storage(state: &AppState) -> Result<&ObjectStorage> {
    state.storage().ok_or_else(|| StorageError::NotConfigured.into())
}

/// POST /api/uploads/receipt
#[instrument(skip(state, user, request), fields(user_id = %user.id))]
pub async fn receipt(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(request): Json<ReceiptUploadRequest>,
) -> Result<Json<PresignedUpload>> {
    let storage = storage(&state)?;

    let order = OrderRepository::new(state.pool())
        .get_for_user(user.id, request.order_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {}", request.order_id)))?;
    if order.payment_type != PaymentType::DirectTransfer {
        return Err(AppError::BadRequest(
            "receipts are only accepted for direct transfer orders".to_string(),
        ));
    }

    let upload =
        storage
        .presign_upload(UploadKind::TransferReceipt, &request.content_type, Some(user.id))
        .await?;
    Ok(Json(upload))
}

/// POST /api/admin/uploads
#[instrument(skip(state, admin, request), fields(admin_id = %admin.id))]
pub async fn admin_upload(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(request): Json<UploadRequest>,
) -> Result<Json<PresignedUpload>> {
    let storage = storage(&state)?;
    if request.kind == UploadKind::TransferReceipt {
        return Err(AppError::BadRequest(
            "receipts are uploaded by the order owner".to_string(),
        ));
    }

    let upload = storage
        .presign_upload(request.kind, &request.content_type, None)
        .await?;
    Ok(Json(upload))
}
