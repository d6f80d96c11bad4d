//! Monetary amounts with exact decimal arithmetic.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// A monetary amount with currency information.
///
/// Amounts are held as [`Decimal`] so repeated additions never accumulate
/// floating-point drift; two fraction digits of currency precision are exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// Amount in the currency's standard unit (rupees, not paise).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency: CurrencyCode,
}

impl Money {
    /// Create a new monetary amount.
    #[must_use]
    pub const fn new(amount: Decimal, currency: CurrencyCode) -> Self {
        Self { amount, currency }
    }

    /// Create an INR amount from rupees.
    #[must_use]
    pub const fn inr(amount: Decimal) -> Self {
        Self::new(amount, CurrencyCode::INR)
    }

    /// Amount in the currency's minor unit (paise for INR), rounded to the
    /// nearest whole unit.
    ///
    /// This is the representation payment gateways take on the wire.
    #[must_use]
    pub fn to_minor_units(&self) -> i64 {
        (self.amount * Decimal::from(100)).round().to_i64().unwrap_or(0)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{:.2}", self.currency.symbol(), self.amount)
    }
}

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    INR,
    USD,
}

impl CurrencyCode {
    /// Display symbol for the currency.
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::INR => "₹",
            Self::USD => "$",
        }
    }

    /// Three-letter currency code as sent to payment gateways.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::INR => "INR",
            Self::USD => "USD",
        }
    }
}
