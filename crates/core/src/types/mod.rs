//! Core types for Tillpoint.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod payment;
pub mod price;

pub use id::*;
pub use payment::{ParsePaymentMethodError, PaymentMethod, SaleStatus};
pub use price::Price;
