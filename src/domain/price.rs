//! Album price backed by rust_decimal.
//!
//! Stored as canonical decimal text so prices survive the database without
//! floating-point drift. Serialized to JSON as a number.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Non-lossy monetary amount.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Price(#[serde(with = "rust_decimal::serde::float")] Decimal);

impl Price {
    /// Parse a price from its decimal text form.
    ///
    /// # Errors
    /// Returns an error if the string is not a valid decimal number.
    pub fn from_str_canonical(s: &str) -> Result<Self, rust_decimal::Error> {
        Decimal::from_str(s.trim()).map(Price)
    }

    /// Canonical text form used for storage (no exponent, no trailing zeros).
    pub fn to_canonical_string(&self) -> String {
        self.0.normalize().to_string()
    }

    /// True for amounts strictly below zero. `-0` is not negative.
    pub fn is_negative(&self) -> bool {
        !self.0.is_zero() && self.0.is_sign_negative()
    }
}
