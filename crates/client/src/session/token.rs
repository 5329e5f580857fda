//! JWT token pair and claim decoding.
//!
//! The client never verifies signatures - that is the server's job. Claims
//! are decoded only to read the expiry window (and the user id the backend
//! embeds), and are recomputed from the token string whenever needed rather
//! than stored.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while decoding a token's claims.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The token is not a three-part JWT.
    #[error("Token is not a three-part JWT")]
    Malformed,

    /// The payload segment is not valid base64url.
    #[error("Token payload is not base64url: {0}")]
    Decode(#[from] base64::DecodeError),

    /// The payload JSON does not carry the expected claims.
    #[error("Token claims are unreadable: {0}")]
    Claims(#[from] serde_json::Error),
}

/// Claims the client cares about, decoded from a token payload.
///
/// The backend's JWTs also carry `token_type` and `jti`; those are ignored.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Claims {
    /// Unix timestamp (seconds) after which the token must not be presented.
    pub exp: i64,
    /// Numeric user id, when the backend embeds one.
    #[serde(default)]
    pub user_id: Option<i64>,
}

impl Claims {
    /// Whether the claimed validity window has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }

    /// The expiry instant, when representable.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

/// Decode the claims segment of a JWT without verifying its signature.
///
/// # Errors
///
/// Returns `TokenError` if the token does not have three dot-separated
/// segments, the payload is not base64url, or the claims JSON is missing
/// `exp`.
pub fn decode_claims(token: &str) -> Result<Claims, TokenError> {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(TokenError::Malformed);
    };

    let bytes = URL_SAFE_NO_PAD.decode(payload)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// The current access/refresh credential pair.
///
/// Implements `Debug` manually to redact both tokens.
#[derive(Clone)]
pub struct TokenPair {
    /// Bearer token presented on API requests.
    pub access: SecretString,
    /// Long-lived token exchanged for new access tokens.
    pub refresh: SecretString,
}

impl TokenPair {
    /// Decode the access token's claims.
    ///
    /// # Errors
    ///
    /// Returns `TokenError` if the access token is not a readable JWT.
    pub fn access_claims(&self) -> Result<Claims, TokenError> {
        decode_claims(self.access.expose_secret())
    }
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access", &"[REDACTED]")
            .field("refresh", &"[REDACTED]")
            .finish()
    }
}

/// Wire shape for the persisted `auth.tokens` entry.
#[derive(Serialize, Deserialize)]
pub(crate) struct StoredTokenPair {
    pub access: String,
    pub refresh: String,
}

impl From<&TokenPair> for StoredTokenPair {
    fn from(pair: &TokenPair) -> Self {
        Self {
            access: pair.access.expose_secret().to_string(),
            refresh: pair.refresh.expose_secret().to_string(),
        }
    }
}

impl From<StoredTokenPair> for TokenPair {
    fn from(stored: StoredTokenPair) -> Self {
        Self {
            access: SecretString::from(stored.access),
            refresh: SecretString::from(stored.refresh),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_tokens {
    use super::*;

    /// Mint an unsigned JWT whose claims expire at `exp` (unix seconds).
    pub fn mint(exp: i64, user_id: i64) -> String {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD
            .encode(serde_json::json!({ "exp": exp, "user_id": user_id }).to_string());
        format!("{header}.{payload}.sig")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_claims() {
        let now = Utc::now().timestamp();
        let token = test_tokens::mint(now + 3600, 7);

        let claims = decode_claims(&token).expect("decode");
        assert_eq!(claims.exp, now + 3600);
        assert_eq!(claims.user_id, Some(7));
        assert!(!claims.is_expired());
    }

    #[test]
    fn test_expired_claims() {
        let now = Utc::now().timestamp();
        let token = test_tokens::mint(now - 60, 7);

        let claims = decode_claims(&token).expect("decode");
        assert!(claims.is_expired());
    }

    #[test]
    fn test_rejects_malformed_tokens() {
        assert!(matches!(
            decode_claims("not-a-jwt"),
            Err(TokenError::Malformed)
        ));
        assert!(matches!(
            decode_claims("a.b.c.d"),
            Err(TokenError::Malformed)
        ));
        assert!(matches!(
            decode_claims("a.!!!.c"),
            Err(TokenError::Decode(_))
        ));
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let pair = TokenPair {
            access: SecretString::from("secret-access"),
            refresh: SecretString::from("secret-refresh"),
        };
        let rendered = format!("{pair:?}");
        assert!(!rendered.contains("secret-access"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn test_stored_pair_round_trip() {
        let pair = TokenPair {
            access: SecretString::from("a"),
            refresh: SecretString::from("r"),
        };
        let json = serde_json::to_string(&StoredTokenPair::from(&pair)).expect("encode");
        let stored: StoredTokenPair = serde_json::from_str(&json).expect("decode");
        let back = TokenPair::from(stored);
        assert_eq!(back.access.expose_secret(), "a");
        assert_eq!(back.refresh.expose_secret(), "r");
    }
}
