//! Tillpoint Client - the headless engine of the point-of-sale terminal.
//!
//! This crate owns the three stateful pieces every front-end builds on:
//!
//! - [`session`] - authentication lifecycle: login, logout, restore at
//!   startup, and transparent refresh of the JWT token pair with coalescing
//!   of concurrent refreshes
//! - [`api`] - the resilient request client that attaches the bearer
//!   credential to every call and retries exactly once after a refresh when
//!   the server rejects a stale token
//! - [`cart`] - the in-progress sale: merge-by-product line items, totals,
//!   and the submission payload
//!
//! # Persistence
//!
//! Both the token pair and the cart snapshot survive a process restart via
//! the [`store::PersistentStore`] trait. Production uses [`store::FileStore`]
//! (one file per entry, atomic replace); tests inject
//! [`store::MemoryStore`].
//!
//! # Concurrency
//!
//! Cart operations are synchronous and never interleave. Network operations
//! suspend only at await points; at most one token refresh is in flight at
//! a time and concurrent callers share its outcome.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod config;
pub mod session;
pub mod store;
pub mod types;

pub use api::{ApiClient, ApiError, ApiRequest};
pub use cart::{Cart, CartError, CartManager, LineItem};
pub use config::{ConfigError, PosConfig};
pub use session::{AuthError, SessionManager, SessionStatus};
pub use store::{FileStore, MemoryStore, PersistentStore, StoreError};
