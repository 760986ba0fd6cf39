//! Payment gateway abstraction.
//!
//! [`PaymentGateway`] covers the two calls checkout and webhooks need:
//! creating a hosted-checkout preference and fetching a payment by ID.
//! [`mercadopago::MercadoPagoGateway`] is the production implementation.

pub mod mercadopago;
pub mod webhook;

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;

use mercadoboom_core::{CurrencyCode, PaymentStatus};

use crate::config::MercadoPagoConfig;

/// Errors that can occur talking to the payment gateway.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    /// No gateway credentials are configured.
    #[error("online payments are not configured")]
    NotConfigured,

    /// A webhook body or query could not be understood.
    #[error("invalid notification: {0}")]
    InvalidNotification(String),

    /// A webhook signature was missing or wrong.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Gateway returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse a gateway response.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Build the configured gateway.
///
/// # Errors
///
/// Returns `PaymentError::Parse` if the access token can't be used as a header.
pub fn create_gateway(config: &MercadoPagoConfig) -> Result<Arc<dyn PaymentGateway>, PaymentError> {
    Ok(Arc::new(mercadopago::MercadoPagoGateway::new(config)?))
}

/// One line of a hosted-checkout preference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreferenceItem {
    pub id: String,
    pub title: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub currency_id: CurrencyCode,
}

/// Where the gateway sends the buyer back to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackUrls {
    pub success: String,
    pub failure: String,
    pub pending: String,
}

/// A hosted-checkout preference to create.
#[derive(Debug, Clone)]
pub struct PreferenceRequest {
    /// Our checkout ID; comes back on every payment notification.
    pub external_reference: String,
    pub items: Vec<PreferenceItem>,
    pub payer_email: String,
    pub back_urls: BackUrls,
    pub notification_url: String,
}

/// A created preference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preference {
    pub id: String,
    /// URL the buyer is redirected to.
    pub init_point: String,
}

/// A payment as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayPayment {
    pub id: String,
    pub status: PaymentStatus,
    pub status_detail: Option<String>,
    pub external_reference: Option<String>,
    pub transaction_amount: Option<Decimal>,
}

/// Payment gateway interface.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a hosted-checkout preference.
    async fn create_preference(
        &self,
        request: &PreferenceRequest,
    ) -> Result<Preference, PaymentError>;

    /// Fetch a payment by the ID received in a notification.
    async fn get_payment(&self, payment_id: &str) -> Result<GatewayPayment, PaymentError>;
}
