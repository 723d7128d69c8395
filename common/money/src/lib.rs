use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("amount is not a finite number")]
    NotFinite,
    #[error("amount '{0}' is not a decimal number")]
    Unparseable(String),
}

fn cent() -> BigDecimal {
    BigDecimal::new(1.into(), 2)
}

fn half_cent() -> BigDecimal {
    BigDecimal::new(5.into(), 3)
}

/// Normalize a monetary value to 2 decimal places, rounding half away from zero.
pub fn normalize_scale(value: &BigDecimal) -> BigDecimal {
    // with_scale truncates toward zero; the dropped remainder decides the carry.
    let truncated = value.with_scale(2);
    let remainder = (value - &truncated).abs();
    if remainder < half_cent() {
        return truncated;
    }
    let rounded = if *value < BigDecimal::from(0) {
        truncated - cent()
    } else {
        truncated + cent()
    };
    rounded.with_scale(2)
}

/// Render a value with exactly two fractional digits (`87.5` -> `"87.50"`).
pub fn format_amount(value: &BigDecimal) -> String {
    normalize_scale(value).to_string()
}

/// Decimal amount as received from checkout payloads.
///
/// Deserializes from a JSON number or a numeric string and always serializes
/// as a two-decimal string, which is what the payment providers expect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawAmount", into = "String")]
pub struct Amount(BigDecimal);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAmount {
    Number(f64),
    Text(String),
}

impl TryFrom<RawAmount> for Amount {
    type Error = MoneyError;

    fn try_from(raw: RawAmount) -> Result<Self, Self::Error> {
        match raw {
            RawAmount::Number(value) => Amount::from_f64(value),
            RawAmount::Text(text) => text.parse(),
        }
    }
}

impl From<Amount> for String {
    fn from(value: Amount) -> Self {
        value.to_fixed()
    }
}

impl Amount {
    pub fn new(raw: BigDecimal) -> Self {
        Self(raw)
    }

    /// Convert a float using its shortest round-trip representation, so `87.5`
    /// becomes exactly `87.5` rather than its binary expansion.
    pub fn from_f64(value: f64) -> Result<Self, MoneyError> {
        if !value.is_finite() {
            return Err(MoneyError::NotFinite);
        }
        value.to_string().parse()
    }

    /// Positive once rounded to cents; `0.004` is not.
    pub fn is_positive(&self) -> bool {
        normalize_scale(&self.0) > BigDecimal::from(0)
    }

    /// Two-decimal wire form used for hashing and transmission.
    pub fn to_fixed(&self) -> String {
        format_amount(&self.0)
    }

    pub fn times(&self, quantity: u32) -> Amount {
        Amount(&self.0 * BigDecimal::from(quantity))
    }
}

impl FromStr for Amount {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BigDecimal::from_str(s.trim())
            .map(Amount)
            .map_err(|_| MoneyError::Unparseable(s.to_string()))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_fixed())
    }
}

impl From<BigDecimal> for Amount {
    fn from(value: BigDecimal) -> Self {
        Self::new(value)
    }
}
