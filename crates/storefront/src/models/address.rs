//! Shipping addresses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mercadoboom_core::{AddressId, UserId};

/// A user-owned shipping address.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    pub recipient: String,
    pub street: String,
    pub number: String,
    pub apartment: Option<String>,
    pub city: String,
    pub province: String,
    pub postal_code: String,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Address {
    /// Single-line form used in notifications.
    #[must_use]
    pub fn one_line(&self) -> String {
        let mut line = format!("{} {}", self.street, self.number);
        if let Some(apartment) = self.apartment.as_deref().filter(|a| !a.is_empty()) {
            line.push_str(", ");
            line.push_str(apartment);
        }
        format!(
            "{line}, {} ({}), {}",
            self.city, self.postal_code, self.province
        )
    }
}

/// Address create/update body.
#[derive(Debug, Clone, Deserialize)]
pub struct AddressInput {
    pub recipient: String,
    pub street: String,
    pub number: String,
    pub apartment: Option<String>,
    pub city: String,
    pub province: String,
    pub postal_code: String,
    pub phone: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

impl AddressInput {
    /// # Errors
    ///
    /// Returns the name of the first blank required field.
    pub fn validate(&self) -> Result<(), String> {
        let required = [
            ("recipient", &self.recipient),
            ("street", &self.street),
            ("number", &self.number),
            ("city", &self.city),
            ("province", &self.province),
            ("postal_code", &self.postal_code),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(format!("{field} is required"));
            }
        }
        Ok(())
    }
}
