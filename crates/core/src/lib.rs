//! Tillpoint Core - Shared types library.
//!
//! This crate provides common types used across all Tillpoint components:
//! - `client` - Session, request, and cart engine library
//! - `cli` - Terminal front-end for the engine
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no
//! filesystem access. This keeps it lightweight and allows it to be used
//! anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, and payment enums

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
