//! MercadoPago webhook notifications.
//!
//! Notifications arrive either as a JSON body (`{"type": "payment",
//! "data": {"id": "123"}}`), as the legacy IPN shape (`{"topic": "payment",
//! "resource": ".../123"}`) or only as query parameters
//! (`?type=payment&data.id=123`, `?topic=payment&id=123`).
//!
//! When a webhook secret is configured the `x-signature` header is checked:
//!
//! ```text
//! x-signature: ts=1704908010,v1=<hex hmac>
//! manifest   = "id:{data.id};request-id:{x-request-id};ts:{ts};"
//! v1         = hex(HMAC-SHA256(secret, manifest))
//! ```

use std::collections::HashMap;

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::Sha256;
use tracing::debug;

use super::PaymentError;
use crate::services::constant_time_eq;

/// Topic used for payment notifications.
pub const PAYMENT_TOPIC: &str = "payment";

/// A parsed webhook notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// `type` or legacy `topic`.
    pub topic: String,
    /// ID of the resource the notification is about.
    pub resource_id: Option<String>,
}

impl Notification {
    /// Whether this is a payment notification.
    #[must_use]
    pub fn is_payment(&self) -> bool {
        self.topic == PAYMENT_TOPIC || self.topic.starts_with("payment.")
    }
}

#[derive(Debug, Default, Deserialize)]
struct NotificationBody {
    #[serde(rename = "type")]
    kind: Option<String>,
    topic: Option<String>,
    action: Option<String>,
    data: Option<NotificationData>,
    resource: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NotificationData {
    id: serde_json::Value,
}

/// Parse a notification from its body and query string.
///
/// Body fields win over query parameters. An empty body is allowed.
///
/// # Errors
///
/// Returns `PaymentError::InvalidNotification` if the body is not JSON, no
/// topic can be found, or a payment notification carries no ID.
pub fn parse_notification(
    body: &[u8],
    query: &HashMap<String, String>,
) -> Result<Notification, PaymentError> {
    let parsed: NotificationBody = if body.iter().all(u8::is_ascii_whitespace) {
        NotificationBody::default()
    } else {
        serde_json::from_slice(body)
            .map_err(|e| PaymentError::InvalidNotification(format!("invalid JSON body: {e}")))?
    };

    let topic = parsed
        .kind
        .or(parsed.topic)
        .or_else(|| {
            parsed
                .action
                .as_deref()
                .and_then(|a| a.split_once('.'))
                .map(|(topic, _)| topic.to_string())
        })
        .or_else(|| query.get("type").cloned())
        .or_else(|| query.get("topic").cloned())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| PaymentError::InvalidNotification("missing topic".to_string()))?;

    let resource_id = parsed
        .data
        .and_then(|d| json_id(d.id))
        .or_else(|| parsed.resource.as_deref().and_then(resource_tail))
        .or_else(|| query.get("data.id").cloned())
        .or_else(|| query.get("id").cloned())
        .filter(|id| !id.is_empty());

    let notification = Notification { topic, resource_id };

    if notification.is_payment() && notification.resource_id.is_none() {
        return Err(PaymentError::InvalidNotification(
            "payment notification without an id".to_string(),
        ));
    }

    Ok(notification)
}

fn json_id(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Last path segment of a legacy `resource` URL (or the value itself).
fn resource_tail(resource: &str) -> Option<String> {
    resource
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Split an `x-signature` header into `(ts, v1)`.
///
/// # Errors
///
/// Returns `PaymentError::InvalidSignature` if either part is missing.
pub fn parse_signature_header(header: &str) -> Result<(&str, &str), PaymentError> {
    let mut ts = None;
    let mut v1 = None;

    for part in header.split(',') {
        if let Some((key, value)) = part.split_once('=') {
            match key.trim() {
                "ts" => ts = Some(value.trim()),
                "v1" => v1 = Some(value.trim()),
                _ => {}
            }
        }
    }

    match (ts, v1) {
        (Some(ts), Some(v1)) if !ts.is_empty() && !v1.is_empty() => Ok((ts, v1)),
        _ => Err(PaymentError::InvalidSignature(
            "malformed x-signature header".to_string(),
        )),
    }
}

/// Verify the `x-signature` header of a notification.
///
/// # Errors
///
/// Returns `PaymentError::InvalidSignature` if the header is malformed or the
/// signature doesn't match.
pub fn verify_signature(
    secret: &SecretString,
    signature_header: &str,
    request_id: &str,
    data_id: &str,
) -> Result<(), PaymentError> {
    let (ts, v1) = parse_signature_header(signature_header)?;

    let manifest = format!(
        "id:{};request-id:{request_id};ts:{ts};",
        data_id.to_ascii_lowercase()
    );

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.expose_secret().as_bytes())
        .map_err(|e| PaymentError::InvalidSignature(e.to_string()))?;
    mac.update(manifest.as_bytes());

    let expected = hex::encode(mac.finalize().into_bytes());

    if !constant_time_eq(expected.as_bytes(), v1.to_ascii_lowercase().as_bytes()) {
        return Err(PaymentError::InvalidSignature(
            "signature mismatch".to_string(),
        ));
    }

    debug!("MercadoPago signature verified");

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sign(secret: &str, manifest: &str) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(manifest.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_parse_signature_header() {
        let (ts, v1) = parse_signature_header("ts=1704908010, v1=abc123").unwrap();
        assert_eq!(ts, "1704908010");
        assert_eq!(v1, "abc123");

        assert!(parse_signature_header("ts=1704908010").is_err());
        assert!(parse_signature_header("v1=abc").is_err());
        assert!(parse_signature_header("ts=,v1=abc").is_err());
        assert!(parse_signature_header("").is_err());
    }

    #[test]
    fn test_verify_signature() {
        let secret = SecretString::from("webhook-signing-key");
        let v1 = sign(
            "webhook-signing-key",
            "id:123456;request-id:bb56a2f1-6aae-46ac-982e-9dcd3581d08e;ts:1704908010;",
        );
        let header = format!("ts=1704908010,v1={v1}");

        assert!(
            verify_signature(
                &secret,
                &header,
                "bb56a2f1-6aae-46ac-982e-9dcd3581d08e",
                "123456"
            )
            .is_ok()
        );
    }

    #[test]
    fn test_verify_signature_lowercases_data_id() {
        let secret = SecretString::from("webhook-signing-key");
        let v1 = sign("webhook-signing-key", "id:abc99;request-id:req-1;ts:42;");
        let header = format!("ts=42,v1={v1}");
        assert!(verify_signature(&secret, &header, "req-1", "ABC99").is_ok());
    }

    #[test]
    fn test_verify_signature_rejects_tampering() {
        let secret = SecretString::from("webhook-signing-key");
        let v1 = sign("webhook-signing-key", "id:1;request-id:req-1;ts:42;");

        let wrong_id = verify_signature(&secret, &format!("ts=42,v1={v1}"), "req-1", "2");
        assert!(matches!(wrong_id, Err(PaymentError::InvalidSignature(_))));

        let wrong_ts = verify_signature(&secret, &format!("ts=43,v1={v1}"), "req-1", "1");
        assert!(matches!(wrong_ts, Err(PaymentError::InvalidSignature(_))));

        let other = SecretString::from("another-signing-key");
        let wrong_secret = verify_signature(&other, &format!("ts=42,v1={v1}"), "req-1", "1");
        assert!(matches!(wrong_secret, Err(PaymentError::InvalidSignature(_))));
    }

    #[test]
    fn test_parse_json_body() {
        let body = br#"{"action":"payment.updated","type":"payment","data":{"id":"987"}}"#;
        let n = parse_notification(body, &HashMap::new()).unwrap();
        assert_eq!(n.topic, "payment");
        assert_eq!(n.resource_id.as_deref(), Some("987"));
        assert!(n.is_payment());
    }

    #[test]
    fn test_parse_numeric_data_id() {
        let body = br#"{"type":"payment","data":{"id":987}}"#;
        let n = parse_notification(body, &HashMap::new()).unwrap();
        assert_eq!(n.resource_id.as_deref(), Some("987"));
    }

    #[test]
    fn test_parse_legacy_resource() {
        let body = br#"{"topic":"payment","resource":"https://api.mercadolibre.com/collections/notifications/555"}"#;
        let n = parse_notification(body, &HashMap::new()).unwrap();
        assert_eq!(n.resource_id.as_deref(), Some("555"));

        let body = br#"{"topic":"payment","resource":"556"}"#;
        let n = parse_notification(body, &HashMap::new()).unwrap();
        assert_eq!(n.resource_id.as_deref(), Some("556"));
    }

    #[test]
    fn test_parse_query_only() {
        let n = parse_notification(b"", &query(&[("type", "payment"), ("data.id", "42")])).unwrap();
        assert_eq!(n.resource_id.as_deref(), Some("42"));

        let n = parse_notification(b"  ", &query(&[("topic", "payment"), ("id", "43")])).unwrap();
        assert_eq!(n.resource_id.as_deref(), Some("43"));
    }

    #[test]
    fn test_non_payment_topic_is_not_an_error() {
        let n = parse_notification(
            b"",
            &query(&[("topic", "merchant_order"), ("id", "77")]),
        )
        .unwrap();
        assert!(!n.is_payment());
    }

    #[test]
    fn test_invalid_notifications() {
        assert!(matches!(
            parse_notification(b"{not json", &HashMap::new()),
            Err(PaymentError::InvalidNotification(_))
        ));
        assert!(matches!(
            parse_notification(b"{}", &HashMap::new()),
            Err(PaymentError::InvalidNotification(_))
        ));
        assert!(matches!(
            parse_notification(br#"{"type":"payment"}"#, &HashMap::new()),
            Err(PaymentError::InvalidNotification(_))
        ));
    }
}
