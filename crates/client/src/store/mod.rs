//! Durable key-value storage for client state.
//!
//! The session manager and the cart engine both persist through the
//! [`PersistentStore`] trait so tests can substitute [`MemoryStore`] for the
//! on-disk [`FileStore`]. Exactly two entries exist today:
//!
//! - `auth.tokens` - the serialized access/refresh token pair
//! - `pos.cart` - the serialized in-progress sale
//!
//! Each entry is written as one unit; a reader never observes a partial
//! value. Entries carry no schema version - callers treat anything they
//! cannot decode as absent.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use thiserror::Error;

/// Errors that can occur when reading or writing the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A key contains characters the backend cannot represent.
    #[error("Invalid store key: {0}")]
    InvalidKey(String),
}

/// String-keyed durable storage of opaque string blobs.
///
/// All writers run on the client's single logical thread, so implementations
/// need no cross-entry transaction support - only whole-value atomicity per
/// key.
pub trait PersistentStore: Send + Sync {
    /// Read the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backend cannot be read. A missing entry
    /// is `Ok(None)`, not an error.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store `value` under `key`, replacing any existing value atomically.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the value cannot be made durable.
    fn put(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove the entry under `key`. Removing a missing entry is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backend cannot be written.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}
