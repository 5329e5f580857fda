//! Type-safe price representation using decimal arithmetic.
//!
//! The backend serializes money as decimal strings (two fractional digits),
//! so [`Price`] wraps [`rust_decimal::Decimal`] and relies on the
//! `serde-with-str` feature for the wire format. Never use floats for money.

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, AddAssign, Mul, Sub};
use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A monetary amount in the till's single configured currency.
///
/// Line totals are always derived as `unit_price * quantity`; the engine
/// never stores a total it cannot recompute.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// The zero amount.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a price from a raw decimal amount.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create a price from an integer number of major units (e.g. whole dollars).
    #[must_use]
    pub fn from_major(units: i64) -> Self {
        Self(Decimal::from(units))
    }

    /// Get the underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Whether this amount is exactly zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl From<Decimal> for Price {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

impl FromStr for Price {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s).map(Self)
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Price {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Price {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

/// Multiply a unit price by a quantity.
impl Mul<u32> for Price {
    type Output = Self;

    fn mul(self, quantity: u32) -> Self {
        Self(self.0 * Decimal::from(quantity))
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_arithmetic() {
        let unit = Price::from_str("10.50").expect("parse");
        let line = unit * 3;
        assert_eq!(line, Price::from_str("31.50").expect("parse"));

        let total: Price = [line, Price::from_major(5)].into_iter().sum();
        assert_eq!(total, Price::from_str("36.50").expect("parse"));
    }

    #[test]
    fn test_price_display_two_decimals() {
        assert_eq!(Price::from_major(7).to_string(), "7.00");
        assert_eq!(Price::from_str("19.9").expect("parse").to_string(), "19.90");
    }

    #[test]
    fn test_price_serializes_as_string() {
        let price = Price::from_str("12.34").expect("parse");
        let json = serde_json::to_string(&price).expect("serialize");
        assert_eq!(json, "\"12.34\"");

        let back: Price = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, price);
    }

    #[test]
    fn test_zero() {
        assert!(Price::ZERO.is_zero());
        assert_eq!(Price::ZERO + Price::ZERO, Price::ZERO);
    }
}
