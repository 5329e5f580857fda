//! Authentication error types.

use thiserror::Error;

use crate::store::StoreError;

use super::token::TokenError;

/// Errors surfaced by the session lifecycle manager.
///
/// Only `InvalidCredentials` and `Registration` are meant for user-facing
/// display; everything else indicates an environment or server problem.
/// Refresh failures are deliberately absent - they manifest as an
/// involuntary logout, never as a distinct error.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The server rejected the username/password pair.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The server rejected a registration, with its reason.
    #[error("Registration rejected: {0}")]
    Registration(String),

    /// Transport-level failure talking to the backend.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// No authenticated session is present.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// The granted token could not be read.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// The token pair could not be persisted.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The server answered with an unexpected status.
    #[error("Unexpected response: HTTP {0}")]
    UnexpectedStatus(reqwest::StatusCode),
}
