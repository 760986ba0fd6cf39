//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `STOREFRONT_BASE_URL` - Public URL of the API server
//! - `STOREFRONT_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `STOREFRONT_FRONTEND_URL` - Public URL of the SPA (default: base URL)
//! - `STOREFRONT_TRUSTED_PROXIES` - Comma-separated proxy IPs allowed to set
//!   `X-Forwarded-For` / `X-Real-IP` (default: none)
//! - `MERCADOPAGO_ACCESS_TOKEN`, `MERCADOPAGO_WEBHOOK_SECRET`, `MERCADOPAGO_API_URL`
//! - `SMTP_HOST`, `SMTP_PORT`, `SMTP_USERNAME`, `SMTP_PASSWORD`, `EMAIL_FROM`
//! - `SMS_API_URL`, `SMS_ACCOUNT_ID`, `SMS_AUTH_TOKEN`, `SMS_FROM`
//! - `STORAGE_ENDPOINT`, `STORAGE_BUCKET`, `STORAGE_REGION`, `STORAGE_ACCESS_KEY`,
//!   `STORAGE_SECRET_KEY`, `STORAGE_PUBLIC_URL`
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`, `SENTRY_TRACES_SAMPLE_RATE`
//!
//! Each optional integration is either fully configured or disabled. A group
//! with only some of its variables set is logged and left disabled.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Default MercadoPago REST endpoint.
pub const DEFAULT_MERCADOPAGO_API_URL: &str = "https://api.mercadopago.com";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of this API (used for webhook notification URLs)
    pub base_url: String,
    /// Public URL of the SPA (used for payment back URLs)
    pub frontend_url: String,
    /// Session signing secret
    pub session_secret: SecretString,
    /// Reverse proxies whose forwarding headers identify the client
    pub trusted_proxies: Vec<IpAddr>,
    /// MercadoPago gateway credentials
    pub mercadopago: Option<MercadoPagoConfig>,
    /// SMTP delivery
    pub email: Option<EmailConfig>,
    /// SMS provider
    pub sms: Option<SmsConfig>,
    /// S3-compatible object storage for uploads
    pub storage: Option<StorageConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 - 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate (0.0 - 1.0)
    pub sentry_traces_sample_rate: f32,
}

/// MercadoPago gateway configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct MercadoPagoConfig {
    /// Private access token (`APP_USR-...`)
    pub access_token: SecretString,
    /// Secret used to sign webhook notifications
    pub webhook_secret: Option<SecretString>,
    /// REST endpoint, overridable for sandboxes
    pub api_url: String,
}

impl std::fmt::Debug for MercadoPagoConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MercadoPagoConfig")
            .field("access_token", &"[REDACTED]")
            .field(
                "webhook_secret",
                &self.webhook_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// SMTP configuration for transactional email.
#[derive(Clone)]
pub struct EmailConfig {
    /// SMTP server hostname
    pub smtp_host: String,
    /// SMTP server port (STARTTLS)
    pub smtp_port: u16,
    /// SMTP username
    pub smtp_username: String,
    /// SMTP password
    pub smtp_password: SecretString,
    /// Sender address (e.g. `MercadoBoom <no-reply@mercadoboom.com.ar>`)
    pub from_address: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

/// SMS provider configuration (Twilio-style REST API).
#[derive(Clone)]
pub struct SmsConfig {
    /// Base URL of the provider API
    pub api_url: String,
    /// Account identifier (basic auth user)
    pub account_id: String,
    /// Auth token (basic auth password)
    pub auth_token: SecretString,
    /// Sender number
    pub from_number: String,
}

impl std::fmt::Debug for SmsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmsConfig")
            .field("api_url", &self.api_url)
            .field("account_id", &self.account_id)
            .field("auth_token", &"[REDACTED]")
            .field("from_number", &self.from_number)
            .finish()
    }
}

/// S3-compatible object storage configuration.
#[derive(Clone)]
pub struct StorageConfig {
    /// Endpoint URL (e.g. `https://s3.sa-east-1.amazonaws.com`)
    pub endpoint: String,
    /// Bucket name
    pub bucket: String,
    /// Signing region
    pub region: String,
    /// Access key ID
    pub access_key: String,
    /// Secret access key
    pub secret_key: SecretString,
    /// Public base URL objects are served from
    pub public_url: String,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("access_key", &self.access_key)
            .field("secret_key", &"[REDACTED]")
            .field("public_url", &self.public_url)
            .finish()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;
        let host = get_env_or_default("STOREFRONT_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_HOST".to_string(), e.to_string())
            })?;
        let port = get_env_or_default("STOREFRONT_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_PORT".to_string(), e.to_string())
            })?;
        let base_url = trim_url(get_required_env("STOREFRONT_BASE_URL")?);
        url::Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("STOREFRONT_BASE_URL".to_string(), e.to_string())
        })?;
        let frontend_url = get_optional_env("STOREFRONT_FRONTEND_URL")
            .map_or_else(|| base_url.clone(), trim_url);
        let session_secret = get_validated_secret("STOREFRONT_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "STOREFRONT_SESSION_SECRET")?;
        let trusted_proxies = get_optional_env("STOREFRONT_TRUSTED_PROXIES")
            .map(|list| parse_ip_list(&list, "STOREFRONT_TRUSTED_PROXIES"))
            .transpose()?
            .unwrap_or_default();

        let mercadopago = MercadoPagoConfig::from_env()?;
        let email = EmailConfig::from_env()?;
        let sms = SmsConfig::from_env();
        let storage = StorageConfig::from_env();
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.1);

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            frontend_url,
            session_secret,
            trusted_proxies,
            mercadopago,
            email,
            sms,
            storage,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl MercadoPagoConfig {
    /// Returns `None` when `MERCADOPAGO_ACCESS_TOKEN` is unset (gateway disabled).
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(token) = get_optional_env("MERCADOPAGO_ACCESS_TOKEN") else {
            if get_optional_env("MERCADOPAGO_WEBHOOK_SECRET").is_some() {
                tracing::warn!(
                    "MERCADOPAGO_WEBHOOK_SECRET set without MERCADOPAGO_ACCESS_TOKEN, gateway disabled"
                );
            }
            return Ok(None);
        };
        validate_secret_strength(&token, "MERCADOPAGO_ACCESS_TOKEN")?;

        let webhook_secret = match get_optional_env("MERCADOPAGO_WEBHOOK_SECRET") {
            Some(secret) => {
                validate_secret_strength(&secret, "MERCADOPAGO_WEBHOOK_SECRET")?;
                Some(SecretString::from(secret))
            }
            None => {
                tracing::warn!(
                    "MERCADOPAGO_WEBHOOK_SECRET not set, webhook signatures will not be verified"
                );
                None
            }
        };

        Ok(Some(Self {
            access_token: SecretString::from(token),
            webhook_secret,
            api_url: trim_url(get_env_or_default(
                "MERCADOPAGO_API_URL",
                DEFAULT_MERCADOPAGO_API_URL,
            )),
        }))
    }
}

impl EmailConfig {
    /// Returns `None` unless the whole SMTP group is present.
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let group = (
            get_optional_env("SMTP_HOST"),
            get_optional_env("SMTP_USERNAME"),
            get_optional_env("SMTP_PASSWORD"),
            get_optional_env("EMAIL_FROM"),
        );

        let (smtp_host, smtp_username, smtp_password, from_address) = match group {
            (Some(host), Some(username), Some(password), Some(from)) => {
                (host, username, password, from)
            }
            (None, None, None, None) => return Ok(None),
            _ => {
                tracing::warn!("SMTP configuration incomplete, email delivery disabled");
                return Ok(None);
            }
        };

        let smtp_port = get_env_or_default("SMTP_PORT", "587")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("SMTP_PORT".to_string(), e.to_string()))?;

        Ok(Some(Self {
            smtp_host,
            smtp_port,
            smtp_username,
            smtp_password: SecretString::from(smtp_password),
            from_address,
        }))
    }
}

impl SmsConfig {
    /// Returns `None` unless the whole SMS group is present.
    fn from_env() -> Option<Self> {
        let api_url = get_optional_env("SMS_API_URL");
        let account_id = get_optional_env("SMS_ACCOUNT_ID");
        let auth_token = get_optional_env("SMS_AUTH_TOKEN");
        let from_number = get_optional_env("SMS_FROM");

        match (api_url, account_id, auth_token, from_number) {
            (Some(api_url), Some(account_id), Some(auth_token), Some(from_number)) => {
                if let Err(e) = validate_secret_strength(&auth_token, "SMS_AUTH_TOKEN") {
                    tracing::warn!("SMS_AUTH_TOKEN validation warning: {e}");
                }
                Some(Self {
                    api_url: trim_url(api_url),
                    account_id,
                    auth_token: SecretString::from(auth_token),
                    from_number,
                })
            }
            (None, None, None, None) => None,
            _ => {
                tracing::warn!("SMS configuration incomplete, SMS delivery disabled");
                None
            }
        }
    }
}

impl StorageConfig {
    /// Returns `None` unless the whole storage group is present.
    fn from_env() -> Option<Self> {
        let values = [
            "STORAGE_ENDPOINT",
            "STORAGE_BUCKET",
            "STORAGE_REGION",
            "STORAGE_ACCESS_KEY",
            "STORAGE_SECRET_KEY",
            "STORAGE_PUBLIC_URL",
        ]
        .map(get_optional_env);

        if values.iter().all(Option::is_none) {
            return None;
        }

        let [
            Some(endpoint),
            Some(bucket),
            Some(region),
            Some(access_key),
            Some(secret_key),
            Some(public_url),
        ] = values
        else {
            tracing::warn!("Object storage configuration incomplete, uploads disabled");
            return None;
        };

        Some(Self {
            endpoint: trim_url(endpoint),
            bucket,
            region,
            access_key,
            secret_key: SecretString::from(secret_key),
            public_url: trim_url(public_url),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse a comma-separated list of IP addresses.
fn parse_ip_list(list: &str, var_name: &str) -> Result<Vec<IpAddr>, ConfigError> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<IpAddr>().map_err(|e| {
                ConfigError::InvalidEnvVar(var_name.to_string(), format!("{s}: {e}"))
            })
        })
        .collect()
}

/// Strip trailing slashes so paths can be appended with `format!`.
fn trim_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    /// Minimal config for tests that only need the core fields.
    pub(crate) fn test_config() -> StorefrontConfig {
        StorefrontConfig {
            database_url: SecretString::from("postgres://localhost/mercadoboom_test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            session_secret: SecretString::from("x".repeat(32)),
            trusted_proxies: vec![],
            mercadopago: None,
            email: None,
            sms: None,
            storage: None,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.1,
        }
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-access-token-here", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_gateway_token() {
        let result = validate_secret_strength(
            "APP_USR-7364021985-041523-9f8b2c1d4e6a7b3c0d5e8f9a1b2c3d4e-1928374650",
            "MERCADOPAGO_ACCESS_TOKEN",
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_session_secret_too_short() {
        let secret = SecretString::from("short");
        assert!(validate_session_secret(&secret, "TEST_SESSION").is_err());
    }

    #[test]
    fn test_validate_session_secret_valid_length() {
        let secret = SecretString::from("a".repeat(32));
        assert!(validate_session_secret(&secret, "TEST_SESSION").is_ok());
    }

    #[test]
    fn test_trim_url() {
        assert_eq!(
            trim_url("https://mercadoboom.com.ar/".to_string()),
            "https://mercadoboom.com.ar"
        );
        assert_eq!(trim_url("http://a".to_string()), "http://a");
    }

    #[test]
    fn test_parse_ip_list() {
        let ips = parse_ip_list("10.0.0.2, ::1,", "TEST_VAR").unwrap();
        assert_eq!(ips, vec!["10.0.0.2".parse::<IpAddr>().unwrap(), "::1".parse().unwrap()]);
        assert!(matches!(
            parse_ip_list("10.0.0.2,proxy.internal", "TEST_VAR"),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));
    }

    #[test]
    fn test_socket_addr() {
        let addr = test_config().socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }

    #[test]
    fn test_config_debug_redacts_secrets() {
        let mp = MercadoPagoConfig {
            access_token: SecretString::from("APP_USR-super-private-token"),
            webhook_secret: Some(SecretString::from("webhook-signing-key")),
            api_url: DEFAULT_MERCADOPAGO_API_URL.to_string(),
        };
        let storage = StorageConfig {
            endpoint: "https://s3.sa-east-1.amazonaws.com".to_string(),
            bucket: "mercadoboom-media".to_string(),
            region: "sa-east-1".to_string(),
            access_key: "AKIAEXAMPLEKEY".to_string(),
            secret_key: SecretString::from("storage-secret-value"),
            public_url: "https://cdn.mercadoboom.com.ar".to_string(),
        };

        let debug_output = format!("{mp:?} {storage:?}");

        assert!(debug_output.contains("api.mercadopago.com"));
        assert!(debug_output.contains("mercadoboom-media"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super-private-token"));
        assert!(!debug_output.contains("webhook-signing-key"));
        assert!(!debug_output.contains("storage-secret-value"));
    }
}

#[cfg(test)]
pub(crate) use tests::test_config;
