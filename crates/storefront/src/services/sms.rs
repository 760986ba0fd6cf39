//! SMS delivery through an HTTP provider.
//!
//! The provider speaks the Twilio message API: a form-encoded `POST` to
//! `{api_url}/Accounts/{account_id}/Messages.json` with HTTP basic auth.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

use crate::config::SmsConfig;

/// Errors that can occur when sending SMS.
#[derive(Debug, Error)]
pub enum SmsError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider rejected the message.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The destination number is unusable.
    #[error("invalid phone number: {0}")]
    InvalidNumber(String),
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    sid: Option<String>,
}

/// SMS client.
#[derive(Clone)]
pub struct SmsClient {
    client: reqwest::Client,
    messages_url: String,
    account_id: String,
    auth_token: SecretString,
    from_number: String,
}

impl SmsClient {
    /// Create a new SMS client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &SmsConfig) -> Result<Self, SmsError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            messages_url: format!(
                "{}/Accounts/{}/Messages.json",
                config.api_url,
                urlencoding::encode(&config.account_id)
            ),
            account_id: config.account_id.clone(),
            auth_token: config.auth_token.clone(),
            from_number: config.from_number.clone(),
        })
    }

    /// Send a text message.
    ///
    /// # Errors
    ///
    /// Returns `SmsError::InvalidNumber` for an empty or malformed number and
    /// `SmsError::Api` when the provider rejects the message.
    pub async fn send(&self, to: &str, body: &str) -> Result<(), SmsError> {
        let to = normalize_phone(to).ok_or_else(|| SmsError::InvalidNumber(to.to_string()))?;

        let params = [
            ("To", to.as_str()),
            ("From", self.from_number.as_str()),
            ("Body", body),
        ];

        let response = self
            .client
            .post(&self.messages_url)
            .basic_auth(&self.account_id, Some(self.auth_token.expose_secret()))
            .form(&params)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SmsError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let sid = response
            .json::<MessageResponse>()
            .await
            .ok()
            .and_then(|r| r.sid)
            .unwrap_or_default();
        tracing::info!(to = %mask_phone(&to), sid = %sid, "SMS sent");
        Ok(())
    }
}

/// Keep a leading `+` and the digits; reject numbers too short to dial.
fn normalize_phone(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    if digits.len() < 8 {
        return None;
    }
    if trimmed.starts_with('+') {
        Some(format!("+{digits}"))
    } else {
        Some(digits)
    }
}

/// Show only the last four digits in logs.
fn mask_phone(phone: &str) -> String {
    let visible = phone.len().saturating_sub(4);
    format!("{}{}", "*".repeat(visible), &phone[visible..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_phone() {
        assert_eq!(
            normalize_phone(" +54 9 11 5555-1234 ").as_deref(),
            Some("+5491155551234")
        );
        assert_eq!(normalize_phone("011 4555-1234").as_deref(), Some("01145551234"));
        assert_eq!(normalize_phone("1234"), None);
        assert_eq!(normalize_phone(""), None);
    }

    #[test]
    fn test_mask_phone() {
        assert_eq!(mask_phone("+5491155551234"), "**********1234");
        assert_eq!(mask_phone("12"), "12");
    }
}
