//! Cart engine error types.

use thiserror::Error;

use crate::store::StoreError;

/// Errors surfaced by the cart engine.
#[derive(Debug, Error)]
pub enum CartError {
    /// The caller passed a non-positive quantity to `add_item`.
    #[error("Quantity must be a positive integer")]
    InvalidQuantity,

    /// The cart snapshot could not be serialized.
    #[error("Failed to encode cart snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),

    /// The cart snapshot could not be persisted.
    #[error(transparent)]
    Store(#[from] StoreError),
}
