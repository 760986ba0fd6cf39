//! Checkout and payment route handlers.
//!
//! # Webhook
//!
//! MercadoPago calls `POST /api/payments/webhook` for every payment event and
//! retries until it gets a 2xx. The handler answers:
//!
//! - `401` when a webhook secret is configured and the signature is wrong
//! - `200` for topics other than payments, and for payments that don't
//!   belong to a known checkout
//! - `502` when the payment can't be fetched, so the delivery is retried
//!
//! The signed request ID is the upstream `x-request-id`, as kept by the
//! request ID middleware. The notification only carries an ID; the payment
//! itself is always read back from the gateway before any order changes.

use std::collections::HashMap;

use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::{Result, add_breadcrumb};
use crate::middleware::{RequestId, RequireAuth};
use crate::models::order::{CheckoutRequest, DirectTransferResponse, PreferenceResponse};
use crate::models::settings::PublicPaymentConfig;
use crate::services::checkout::{CheckoutService, CheckoutUrls};
use crate::services::orders::OrderService;
use crate::services::payments::{
    GatewayPayment, PaymentError,
    webhook::{parse_notification, verify_signature},
};
use crate::state::AppState;

fn urls(state: &AppState) -> CheckoutUrls<'_> {
    CheckoutUrls {
        frontend_url: &state.config().frontend_url,
        base_url: &state.config().base_url,
    }
}

/// POST /api/payments/create-preference
#[instrument(skip(state, user, request), fields(user_id = %user.id))]
pub async fn create_preference(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<PreferenceResponse>)> {
    let response = CheckoutService::new(state.pool(), state.settings(), state.notifier())
        .create_preference(&user, &request, state.gateway(), urls(&state))
        .await?;

    let checkout_id = response.checkout_id.to_string();
    add_breadcrumb(
        "checkout",
        "Created preference",
        Some(&[("checkout_id", checkout_id.as_str())]),
    );
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/payments/create-direct-transfer
#[instrument(skip(state, user, request), fields(user_id = %user.id))]
pub async fn create_direct_transfer(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<DirectTransferResponse>)> {
    let response = CheckoutService::new(state.pool(), state.settings(), state.notifier())
        .create_direct_transfer(&user, &request)
        .await?;

    let checkout_id = response.checkout_id.to_string();
    add_breadcrumb(
        "checkout",
        "Created direct transfer",
        Some(&[("checkout_id", checkout_id.as_str())]),
    );
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/payments/config
///
/// Public: which payment methods are offered and the transfer details.
#[instrument(skip(state))]
pub async fn config(State(state): State<AppState>) -> Result<Json<PublicPaymentConfig>> {
    Ok(Json(state.settings().public_config(state.pool()).await?))
}

fn header<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// The checkout a payment belongs to.
fn checkout_reference(payment: &GatewayPayment) -> Option<Uuid> {
    payment
        .external_reference
        .as_deref()
        .and_then(|r| Uuid::parse_str(r.trim()).ok())
}

/// POST /api/payments/webhook
#[instrument(skip_all)]
pub async fn webhook(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    RequestId(request_id): RequestId,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode> {
    let notification = parse_notification(&body, &query)?;

    if let Some(secret) = state
        .config()
        .mercadopago
        .as_ref()
        .and_then(|mp| mp.webhook_secret.as_ref())
    {
        let signature = header(&headers, "x-signature").ok_or_else(|| {
            PaymentError::InvalidSignature("missing x-signature header".to_string())
        })?;
        let data_id = notification.resource_id.as_deref().unwrap_or_default();

        if let Err(e) = verify_signature(secret, signature, &request_id, data_id) {
            warn!(error = %e, topic = %notification.topic, "Rejected MercadoPago webhook");
            return Err(e.into());
        }
    }

    if !notification.is_payment() {
        info!(topic = %notification.topic, "Ignoring non-payment notification");
        return Ok(StatusCode::OK);
    }

    let Some(payment_id) = notification.resource_id else {
        return Ok(StatusCode::OK);
    };

    let Some(gateway) = state.gateway() else {
        warn!(%payment_id, "Payment notification received but MercadoPago is not configured");
        return Ok(StatusCode::OK);
    };

    let payment = gateway.get_payment(&payment_id).await.inspect_err(|e| {
        warn!(%payment_id, error = %e, "Could not fetch payment, gateway will retry");
    })?;

    let Some(checkout_id) = checkout_reference(&payment) else {
        warn!(
            %payment_id,
            reference = ?payment.external_reference,
            "Payment has no checkout reference"
        );
        return Ok(StatusCode::OK);
    };

    let orders = OrderService::new(state.pool(), state.notifier())
        .apply_payment(checkout_id, &payment)
        .await?;

    if orders.is_empty() {
        warn!(%payment_id, %checkout_id, "Payment for unknown checkout");
    } else {
        info!(
            %payment_id,
            %checkout_id,
            status = %payment.status,
            order_count = orders.len(),
            "Payment notification processed"
        );
    }

    Ok(StatusCode::OK)
}
