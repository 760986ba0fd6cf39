//! MercadoPago REST client.
//!
//! Uses Checkout Pro preferences (`POST /checkout/preferences`) to start a
//! payment and `GET /v1/payments/{id}` to read its outcome.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use mercadoboom_core::PaymentStatus;

use super::{GatewayPayment, PaymentError, PaymentGateway, Preference, PreferenceRequest};
use crate::config::MercadoPagoConfig;

/// MercadoPago API client.
#[derive(Clone)]
pub struct MercadoPagoGateway {
    client: reqwest::Client,
    api_url: String,
}

#[derive(Debug, Serialize)]
struct PreferenceBody<'a> {
    items: Vec<ItemBody<'a>>,
    payer: PayerBody<'a>,
    back_urls: &'a super::BackUrls,
    auto_return: &'static str,
    notification_url: &'a str,
    external_reference: &'a str,
}

impl<'a> PreferenceBody<'a> {
    fn new(request: &'a PreferenceRequest) -> Self {
        Self {
            items: request
                .items
                .iter()
                .map(|item| ItemBody {
                    id: &item.id,
                    title: &item.title,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    currency_id: item.currency_id,
                })
                .collect(),
            payer: PayerBody {
                email: &request.payer_email,
            },
            back_urls: &request.back_urls,
            auto_return: "approved",
            notification_url: &request.notification_url,
            external_reference: &request.external_reference,
        }
    }
}

#[derive(Debug, Serialize)]
struct ItemBody<'a> {
    id: &'a str,
    title: &'a str,
    quantity: i32,
    #[serde(with = "rust_decimal::serde::float")]
    unit_price: Decimal,
    currency_id: mercadoboom_core::CurrencyCode,
}

#[derive(Debug, Serialize)]
struct PayerBody<'a> {
    email: &'a str,
}

#[derive(Debug, Deserialize)]
struct PreferenceResponse {
    id: String,
    init_point: String,
}

#[derive(Debug, Deserialize)]
struct PaymentResponse {
    id: serde_json::Value,
    status: String,
    status_detail: Option<String>,
    external_reference: Option<String>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    transaction_amount: Option<Decimal>,
}

impl MercadoPagoGateway {
    /// Create a new MercadoPago client.
    ///
    /// # Errors
    ///
    /// Returns error if the access token is not a valid header value or the
    /// HTTP client fails to build.
    pub fn new(config: &MercadoPagoConfig) -> Result<Self, PaymentError> {
        let mut headers = HeaderMap::new();

        let auth_value = format!("Bearer {}", config.access_token.expose_secret());
        headers.insert(
            "Authorization",
            HeaderValue::from_str(&auth_value)
                .map_err(|e| PaymentError::Parse(format!("Invalid access token format: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(15))
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
        })
    }

    async fn error_from(response: reqwest::Response) -> PaymentError {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        PaymentError::Api { status, message }
    }
}

#[async_trait]
impl PaymentGateway for MercadoPagoGateway {
    async fn create_preference(
        &self,
        request: &PreferenceRequest,
    ) -> Result<Preference, PaymentError> {
        let url = format!("{}/checkout/preferences", self.api_url);

        let body = PreferenceBody::new(request);

        let response = self
            .client
            .post(&url)
            // Retried checkouts must not create duplicate preferences.
            .header("X-Idempotency-Key", &request.external_reference)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let created: PreferenceResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::Parse(e.to_string()))?;

        tracing::info!(
            preference_id = %created.id,
            external_reference = %request.external_reference,
            "MercadoPago preference created"
        );

        Ok(Preference {
            id: created.id,
            init_point: created.init_point,
        })
    }

    async fn get_payment(&self, payment_id: &str) -> Result<GatewayPayment, PaymentError> {
        let url = format!(
            "{}/v1/payments/{}",
            self.api_url,
            urlencoding::encode(payment_id)
        );

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let payment: PaymentResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::Parse(e.to_string()))?;

        Ok(to_gateway_payment(payment))
    }
}

fn to_gateway_payment(payment: PaymentResponse) -> GatewayPayment {
    let id = match payment.id {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    };

    GatewayPayment {
        id,
        status: PaymentStatus::from_gateway(&payment.status),
        status_detail: payment.status_detail,
        external_reference: payment.external_reference.filter(|r| !r.is_empty()),
        transaction_amount: payment.transaction_amount,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::payments::{BackUrls, PreferenceItem};

    #[test]
    fn test_payment_response_with_numeric_id() {
        let raw = serde_json::json!({
            "id": 1_319_425_876_u64,
            "status": "approved",
            "status_detail": "accredited",
            "external_reference": "6f1c2d1e-8a43-4c5a-9b1a-0f4a0c7a2b11",
            "transaction_amount": 15999.9
        });
        let payment = to_gateway_payment(serde_json::from_value(raw).unwrap());
        assert_eq!(payment.id, "1319425876");
        assert_eq!(payment.status, PaymentStatus::Approved);
        assert_eq!(
            payment.transaction_amount,
            Some("15999.9".parse::<Decimal>().unwrap())
        );
    }

    #[test]
    fn test_payment_response_unknown_status_and_empty_reference() {
        let raw = serde_json::json!({
            "id": "abc",
            "status": "authorized",
            "external_reference": ""
        });
        let payment = to_gateway_payment(serde_json::from_value(raw).unwrap());
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert!(payment.external_reference.is_none());
        assert!(payment.transaction_amount.is_none());
    }

    #[test]
    fn test_preference_body_shape() {
        let request = PreferenceRequest {
            external_reference: "chk-1".to_string(),
            items: vec![PreferenceItem {
                id: "12".to_string(),
                title: "Auriculares".to_string(),
                quantity: 2,
                unit_price: "1500.50".parse().unwrap(),
                currency_id: mercadoboom_core::CurrencyCode::ARS,
            }],
            payer_email: "ana@example.com".to_string(),
            back_urls: BackUrls {
                success: "https://shop.test/checkout/success".to_string(),
                failure: "https://shop.test/checkout/failure".to_string(),
                pending: "https://shop.test/checkout/pending".to_string(),
            },
            notification_url: "https://api.shop.test/api/payments/webhook".to_string(),
        };
        let body = PreferenceBody::new(&request);

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["items"][0]["unit_price"], serde_json::json!(1500.5));
        assert_eq!(json["items"][0]["currency_id"], "ARS");
        assert_eq!(json["payer"]["email"], "ana@example.com");
        assert_eq!(json["external_reference"], "chk-1");
        assert_eq!(json["back_urls"]["pending"], "https://shop.test/checkout/pending");
    }
}
