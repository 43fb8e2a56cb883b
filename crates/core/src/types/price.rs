//! Type-safe price representation using decimal arithmetic.
//!
//! Payment providers work in minor units (grosze for PLN), while quotes shown
//! to customers are decimal. `Price` converts between the two without floats.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., złoty, not grosze).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// Create a price from an amount in minor units (e.g. 14900 grosze = 149.00 PLN).
    #[must_use]
    pub fn from_minor_units(minor: i64, currency_code: CurrencyCode) -> Self {
        Self {
            amount: Decimal::new(minor, 2),
            currency_code,
        }
    }

    /// Amount in minor units, rounded half away from zero.
    #[must_use]
    pub fn minor_units(&self) -> i64 {
        (self.amount * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .unwrap_or(i64::MAX)
    }

    /// Format for display, e.g. `149.00 PLN`.
    #[must_use]
    pub fn display(&self) -> String {
        format!("{:.2} {}", self.amount, self.currency_code.code())
    }
}

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CurrencyCode {
    #[default]
    PLN,
    EUR,
}

impl CurrencyCode {
    /// Upper-case ISO code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::PLN => "PLN",
            Self::EUR => "EUR",
        }
    }

    /// Lower-case code as expected by the payment provider API.
    #[must_use]
    pub const fn api_code(&self) -> &'static str {
        match self {
            Self::PLN => "pln",
            Self::EUR => "eur",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minor_units_roundtrip() {
        let price = Price::from_minor_units(14_900, CurrencyCode::PLN);
        assert_eq!(price.amount, Decimal::new(14_900, 2));
        assert_eq!(price.minor_units(), 14_900);
    }

    #[test]
    fn test_display() {
        let price = Price::from_minor_units(1_900, CurrencyCode::PLN);
        assert_eq!(price.display(), "19.00 PLN");
    }

    #[test]
    fn test_minor_units_rounds() {
        let price = Price::new(Decimal::new(12_345, 3), CurrencyCode::PLN);
        assert_eq!(price.minor_units(), 1_235);
    }

    #[test]
    fn test_currency_serializes_lowercase() {
        let json = serde_json::to_string(&CurrencyCode::PLN).expect("serialize");
        assert_eq!(json, "\"pln\"");
    }
}
