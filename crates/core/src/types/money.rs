//! Money arithmetic on `rust_decimal`.
//!
//! All amounts are in the currency's standard unit (pesos, not centavos) and
//! are rounded to two decimals, midpoint away from zero, whenever a derived
//! amount is produced.

use core::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Number of decimal places kept for money values.
const MONEY_SCALE: u32 = 2;

/// Round an amount to two decimals, midpoint away from zero.
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Compute `pct` percent of `amount`, rounded to money precision.
///
/// ```
/// use mercadoboom_core::{Percentage, percentage_of};
/// use rust_decimal::Decimal;
///
/// let pct = Percentage::new(Decimal::new(15, 0)).unwrap();
/// assert_eq!(percentage_of(Decimal::new(100_00, 2), pct), Decimal::new(15_00, 2));
/// ```
#[must_use]
pub fn percentage_of(amount: Decimal, pct: Percentage) -> Decimal {
    round_money(amount * pct.as_decimal() / Decimal::ONE_HUNDRED)
}

/// Errors produced when building a [`Percentage`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PercentageError {
    /// Value below zero.
    #[error("percentage cannot be negative")]
    Negative,
    /// Value above one hundred.
    #[error("percentage cannot exceed 100")]
    AboveHundred,
}

/// A percentage between 0 and 100 inclusive, with at most two decimals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct Percentage(Decimal);

impl Percentage {
    /// Zero percent.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Validate and build a percentage.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is outside `0..=100`.
    pub fn new(value: Decimal) -> Result<Self, PercentageError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(PercentageError::Negative);
        }
        if value > Decimal::ONE_HUNDRED {
            return Err(PercentageError::AboveHundred);
        }
        Ok(Self(round_money(value)))
    }

    /// The underlying decimal value (e.g. `15.5` for 15.5%).
    #[must_use]
    pub const fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Whether this percentage is zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0.normalize())
    }
}

impl<'de> Deserialize<'de> for Percentage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = <Decimal as Deserialize>::deserialize(deserializer)?;
        Self::new(value).map_err(serde::de::Error::custom)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Percentage {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <Decimal as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <Decimal as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Percentage {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let value = <Decimal as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::new(value)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Percentage {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <Decimal as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

/// ISO 4217 currency codes accepted by the payment gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    /// Argentine peso.
    #[default]
    ARS,
    /// US dollar.
    USD,
}

impl CurrencyCode {
    /// The three-letter code sent to the gateway.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::ARS => "ARS",
            Self::USD => "USD",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_round_money_midpoint_away_from_zero() {
        assert_eq!(round_money(dec("10.005")), dec("10.01"));
        assert_eq!(round_money(dec("10.004")), dec("10.00"));
        assert_eq!(round_money(dec("-10.005")), dec("-10.01"));
    }

    #[test]
    fn test_percentage_bounds() {
        assert!(Percentage::new(dec("0")).is_ok());
        assert!(Percentage::new(dec("100")).is_ok());
        assert_eq!(
            Percentage::new(dec("-1")),
            Err(PercentageError::Negative)
        );
        assert_eq!(
            Percentage::new(dec("100.01")),
            Err(PercentageError::AboveHundred)
        );
    }

    #[test]
    fn test_percentage_of() {
        let pct = Percentage::new(dec("10")).unwrap();
        assert_eq!(percentage_of(dec("1999.99"), pct), dec("200.00"));

        let pct = Percentage::new(dec("12.5")).unwrap();
        assert_eq!(percentage_of(dec("80"), pct), dec("10.00"));
    }

    #[test]
    fn test_percentage_deserialize_rejects_out_of_range() {
        assert!(serde_json::from_str::<Percentage>("\"15\"").is_ok());
        assert!(serde_json::from_str::<Percentage>("\"150\"").is_err());
    }

    #[test]
    fn test_percentage_display() {
        let pct = Percentage::new(dec("15.50")).unwrap();
        assert_eq!(pct.to_string(), "15.5%");
    }
}
