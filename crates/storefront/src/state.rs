//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::services::email::EmailService;
use crate::services::notifications::Notifier;
use crate::services::payments::{PaymentError, PaymentGateway, create_gateway};
use crate::services::settings::SettingsService;
use crate::services::sms::SmsClient;
use crate::services::storage::ObjectStorage;

/// Error building the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("payment gateway: {0}")]
    Gateway(#[from] PaymentError),
    #[error("email: {0}")]
    Email(#[from] lettre::transport::smtp::Error),
    #[error("sms: {0}")]
    Sms(#[from] crate::services::sms::SmsError),
}

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    gateway: Option<Arc<dyn PaymentGateway>>,
    notifier: Notifier,
    storage: Option<ObjectStorage>,
    settings: SettingsService,
}

impl AppState {
    /// Build the state, creating a client for every configured integration.
    ///
    /// # Errors
    ///
    /// Returns `StateError` if a configured client can't be built.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, StateError> {
        let gateway = config.mercadopago.as_ref().map(create_gateway).transpose()?;
        let email = config.email.as_ref().map(EmailService::new).transpose()?;
        let sms = config.sms.as_ref().map(SmsClient::new).transpose()?;
        let storage = config.storage.clone().map(ObjectStorage::new);

        if gateway.is_none() {
            tracing::warn!("MercadoPago not configured, online payments disabled");
        }
        if storage.is_none() {
            tracing::info!("Object storage not configured, uploads disabled");
        }

        let notifier = Notifier::new(email, sms, config.frontend_url.clone());

        Ok(Self::from_parts(config, pool, gateway, notifier, storage))
    }

    /// Assemble the state from already-built parts.
    #[must_use]
    pub fn from_parts(
        config: StorefrontConfig,
        pool: PgPool,
        gateway: Option<Arc<dyn PaymentGateway>>,
        notifier: Notifier,
        storage: Option<ObjectStorage>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                gateway,
                notifier,
                storage,
                settings: SettingsService::new(),
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// The payment gateway, when configured.
    #[must_use]
    pub fn gateway(&self) -> Option<&dyn PaymentGateway> {
        self.inner.gateway.as_deref()
    }

    /// Customer messaging.
    #[must_use]
    pub fn notifier(&self) -> &Notifier {
        &self.inner.notifier
    }

    /// Upload presigner, when configured.
    #[must_use]
    pub fn storage(&self) -> Option<&ObjectStorage> {
        self.inner.storage.as_ref()
    }

    /// Cached payment settings.
    #[must_use]
    pub fn settings(&self) -> &SettingsService {
        &self.inner.settings
    }
}
