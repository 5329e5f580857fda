//! Payment and sale status enums.
//!
//! Wire values mirror the backend's `choices` fields, which use
//! SCREAMING_SNAKE_CASE strings.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// How a sale is paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Cash at the till. The default for a fresh cart.
    #[default]
    Cash,
    /// Card terminal.
    Card,
    /// Bank transfer.
    Transfer,
    /// Anything else (voucher, account credit).
    Other,
}

impl PaymentMethod {
    /// Wire value as sent to the backend.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "CASH",
            Self::Card => "CARD",
            Self::Transfer => "TRANSFER",
            Self::Other => "OTHER",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a [`PaymentMethod`] from a string.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown payment method: {0}")]
pub struct ParsePaymentMethodError(String);

impl FromStr for PaymentMethod {
    type Err = ParsePaymentMethodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CASH" => Ok(Self::Cash),
            "CARD" => Ok(Self::Card),
            "TRANSFER" => Ok(Self::Transfer),
            "OTHER" => Ok(Self::Other),
            other => Err(ParsePaymentMethodError(other.to_string())),
        }
    }
}

/// Lifecycle status of a submitted sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SaleStatus {
    /// Paid and finalized.
    Completed,
    /// Awaiting payment or fulfillment.
    Pending,
    /// Voided after creation.
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_method_wire_format() {
        let json = serde_json::to_string(&PaymentMethod::Card).expect("serialize");
        assert_eq!(json, "\"CARD\"");

        let back: PaymentMethod = serde_json::from_str("\"TRANSFER\"").expect("deserialize");
        assert_eq!(back, PaymentMethod::Transfer);
    }

    #[test]
    fn test_payment_method_default_is_cash() {
        assert_eq!(PaymentMethod::default(), PaymentMethod::Cash);
    }

    #[test]
    fn test_payment_method_from_str_case_insensitive() {
        assert_eq!(
            "cash".parse::<PaymentMethod>().expect("parse"),
            PaymentMethod::Cash
        );
        assert!("BARTER".parse::<PaymentMethod>().is_err());
    }
}
