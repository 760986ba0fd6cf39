//! Store-wide settings kept as JSON documents.

use serde::{Deserialize, Serialize};

use mercadoboom_core::Percentage;

/// Settings key for [`PaymentConfig`].
pub const PAYMENT_CONFIG_KEY: &str = "payment_config";

/// Settings key for [`TransferDiscountConfig`].
pub const TRANSFER_DISCOUNT_KEY: &str = "transfer_discount";

/// Which payment methods are offered, plus the bank account for transfers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentConfig {
    pub mercadopago_enabled: bool,
    pub transfer_enabled: bool,
    #[serde(flatten)]
    pub bank: BankDetails,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            mercadopago_enabled: true,
            transfer_enabled: false,
            bank: BankDetails::default(),
        }
    }
}

/// Bank account shown to customers paying by transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BankDetails {
    pub bank_name: Option<String>,
    pub account_holder: Option<String>,
    pub cbu: Option<String>,
    pub alias: Option<String>,
    pub cuit: Option<String>,
    pub instructions: Option<String>,
}

/// Discount applied to the product subtotal of direct-transfer checkouts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferDiscountConfig {
    pub enabled: bool,
    pub percentage: Percentage,
}

impl TransferDiscountConfig {
    /// The percentage to apply, zero when disabled.
    #[must_use]
    pub const fn effective(&self) -> Percentage {
        if self.enabled {
            self.percentage
        } else {
            Percentage::ZERO
        }
    }
}

/// Public view of the payment setup (`GET /api/payments/config`).
#[derive(Debug, Serialize)]
pub struct PublicPaymentConfig {
    pub mercadopago_enabled: bool,
    pub transfer_enabled: bool,
    pub transfer_discount_percentage: Percentage,
    pub bank_details: Option<BankDetails>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_config_defaults_from_empty_document() {
        let config: PaymentConfig = serde_json::from_str("{}").unwrap();
        assert!(config.mercadopago_enabled);
        assert!(!config.transfer_enabled);
        assert_eq!(config.bank, BankDetails::default());
    }

    #[test]
    fn test_payment_config_bank_fields_are_flat() {
        let config: PaymentConfig = serde_json::from_value(serde_json::json!({
            "transfer_enabled": true,
            "cbu": "0170099220000067797370",
            "alias": "MERCADO.BOOM.PESOS"
        }))
        .unwrap();
        assert_eq!(config.bank.alias.as_deref(), Some("MERCADO.BOOM.PESOS"));

        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["cbu"], "0170099220000067797370");
    }

    #[test]
    fn test_transfer_discount_effective() {
        let config = TransferDiscountConfig {
            enabled: false,
            percentage: Percentage::new(rust_decimal::Decimal::TEN).unwrap(),
        };
        assert!(config.effective().is_zero());
        let config = TransferDiscountConfig {
            enabled: true,
            ..config
        };
        assert_eq!(config.effective().as_decimal(), rust_decimal::Decimal::TEN);
    }
}
