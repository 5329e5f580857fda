//! Request client error types.

use reqwest::StatusCode;
use thiserror::Error;

/// Errors surfaced by the resilient request client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server rejected the credential and the single refresh-and-retry
    /// could not recover. The session has already logged out.
    #[error("Authorization expired")]
    AuthorizationExpired,

    /// Transport-level failure (connect, timeout, body decode).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The requested resource does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The server answered with a status the client has no handling for.
    #[error("Unexpected response: HTTP {status}")]
    UnexpectedStatus {
        /// Response status code.
        status: StatusCode,
        /// Response body, for diagnostics.
        body: String,
    },

    /// A request body could not be encoded as JSON.
    #[error("Failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            ApiError::AuthorizationExpired.to_string(),
            "Authorization expired"
        );
        assert_eq!(
            ApiError::NotFound("api/products/99/".to_string()).to_string(),
            "Not found: api/products/99/"
        );
        let err = ApiError::UnexpectedStatus {
            status: StatusCode::BAD_GATEWAY,
            body: String::new(),
        };
        assert_eq!(err.to_string(), "Unexpected response: HTTP 502 Bad Gateway");
    }
}
