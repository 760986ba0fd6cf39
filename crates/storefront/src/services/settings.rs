//! Cached access to payment settings.
//!
//! Checkout reads the payment and transfer discount configuration on every
//! request, so both documents are kept in a `moka` cache (60 second TTL).
//! Writes go through [`SettingsService`] and invalidate the cached entry.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;
use tracing::debug;

use crate::db::{RepositoryError, SettingsRepository};
use crate::models::settings::{
    PAYMENT_CONFIG_KEY, PaymentConfig, PublicPaymentConfig, TRANSFER_DISCOUNT_KEY,
    TransferDiscountConfig,
};

#[derive(Debug, Clone)]
enum CachedSetting {
    Payment(Box<PaymentConfig>),
    TransferDiscount(TransferDiscountConfig),
}

/// Settings reader/writer with an in-memory cache.
#[derive(Clone)]
pub struct SettingsService {
    cache: Arc<Cache<&'static str, CachedSetting>>,
}

impl Default for SettingsService {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsService {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        let cache = Cache::builder()
            .max_capacity(16)
            .time_to_live(Duration::from_secs(60))
            .build();
        Self {
            cache: Arc::new(cache),
        }
    }

    /// Current payment configuration, defaults when never saved.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the settings row can't be read.
    pub async fn payment_config(&self, pool: &PgPool) -> Result<PaymentConfig, RepositoryError> {
        if let Some(CachedSetting::Payment(config)) = self.cache.get(PAYMENT_CONFIG_KEY).await {
            debug!("Cache hit for payment config");
            return Ok(*config);
        }

        let config = SettingsRepository::new(pool)
            .get::<PaymentConfig>(PAYMENT_CONFIG_KEY)
            .await?
            .unwrap_or_default();

        self.cache
            .insert(
                PAYMENT_CONFIG_KEY,
                CachedSetting::Payment(Box::new(config.clone())),
            )
            .await;

        Ok(config)
    }

    /// Current transfer discount, disabled when never saved.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the settings row can't be read.
    pub async fn transfer_discount(
        &self,
        pool: &PgPool,
    ) -> Result<TransferDiscountConfig, RepositoryError> {
        if let Some(CachedSetting::TransferDiscount(config)) =
            self.cache.get(TRANSFER_DISCOUNT_KEY).await
        {
            debug!("Cache hit for transfer discount");
            return Ok(config);
        }

        let config = SettingsRepository::new(pool)
            .get::<TransferDiscountConfig>(TRANSFER_DISCOUNT_KEY)
            .await?
            .unwrap_or_default();

        self.cache
            .insert(TRANSFER_DISCOUNT_KEY, CachedSetting::TransferDiscount(config))
            .await;

        Ok(config)
    }

    /// Save the payment configuration.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the write fails.
    pub async fn set_payment_config(
        &self,
        pool: &PgPool,
        config: &PaymentConfig,
    ) -> Result<(), RepositoryError> {
        SettingsRepository::new(pool)
            .set(PAYMENT_CONFIG_KEY, config)
            .await?;
        self.cache.invalidate(PAYMENT_CONFIG_KEY).await;
        Ok(())
    }

    /// Save the transfer discount.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the write fails.
    pub async fn set_transfer_discount(
        &self,
        pool: &PgPool,
        config: &TransferDiscountConfig,
    ) -> Result<(), RepositoryError> {
        SettingsRepository::new(pool)
            .set(TRANSFER_DISCOUNT_KEY, config)
            .await?;
        self.cache.invalidate(TRANSFER_DISCOUNT_KEY).await;
        Ok(())
    }

    /// What `GET /api/payments/config` returns.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if either setting can't be read.
    pub async fn public_config(&self, pool: &PgPool) -> Result<PublicPaymentConfig, RepositoryError> {
        let payment = self.payment_config(pool).await?;
        let discount = self.transfer_discount(pool).await?;
        Ok(public_view(payment, discount))
    }
}

/// Bank details and the discount are only shown when transfers are offered.
fn public_view(payment: PaymentConfig, discount: TransferDiscountConfig) -> PublicPaymentConfig {
    let transfer_enabled = payment.transfer_enabled;
    PublicPaymentConfig {
        mercadopago_enabled: payment.mercadopago_enabled,
        transfer_enabled,
        transfer_discount_percentage: if transfer_enabled {
            discount.effective()
        } else {
            mercadoboom_core::Percentage::ZERO
        },
        bank_details: transfer_enabled.then_some(payment.bank),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use mercadoboom_core::Percentage;
    use rust_decimal::Decimal;

    use super::*;
    use crate::models::settings::BankDetails;

    fn discount(enabled: bool) -> TransferDiscountConfig {
        TransferDiscountConfig {
            enabled,
            percentage: Percentage::new(Decimal::from(10)).unwrap(),
        }
    }

    #[test]
    fn test_public_view_hides_bank_when_transfer_disabled() {
        let payment = PaymentConfig {
            bank: BankDetails {
                cbu: Some("0170099220000067797370".to_string()),
                ..BankDetails::default()
            },
            ..PaymentConfig::default()
        };
        let view = public_view(payment, discount(true));
        assert!(view.mercadopago_enabled);
        assert!(!view.transfer_enabled);
        assert!(view.bank_details.is_none());
        assert!(view.transfer_discount_percentage.is_zero());
    }

    #[test]
    fn test_public_view_with_transfer() {
        let payment = PaymentConfig {
            transfer_enabled: true,
            bank: BankDetails {
                alias: Some("MERCADO.BOOM.PESOS".to_string()),
                ..BankDetails::default()
            },
            ..PaymentConfig::default()
        };
        let view = public_view(payment, discount(true));
        assert_eq!(
            view.bank_details.unwrap().alias.as_deref(),
            Some("MERCADO.BOOM.PESOS")
        );
        assert_eq!(view.transfer_discount_percentage.as_decimal(), Decimal::from(10));

        let view = public_view(
            PaymentConfig {
                transfer_enabled: true,
                ..PaymentConfig::default()
            },
            discount(false),
        );
        assert!(view.transfer_discount_percentage.is_zero());
    }

    #[tokio::test]
    async fn test_cache_returns_inserted_value() {
        let service = SettingsService::new();
        service
            .cache
            .insert(TRANSFER_DISCOUNT_KEY, CachedSetting::TransferDiscount(discount(true)))
            .await;

        let pool = sqlx::PgPool::connect_lazy("postgres://localhost/unused").unwrap();
        let config = service.transfer_discount(&pool).await.unwrap();
        assert!(config.enabled);
    }
}
