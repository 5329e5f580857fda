//! Session lifecycle management.
//!
//! Single source of truth for "is this terminal authenticated, and with
//! what credential". Owns the token pair, persists it across restarts,
//! refreshes it when the server rejects it, and coalesces concurrent
//! refreshes into one exchange.
//!
//! # Refresh coalescing
//!
//! At most one refresh reaches the server at a time. The first caller
//! becomes the leader and runs the exchange; callers that arrive while it
//! is in flight attach to a shared [`tokio::sync::watch`] handle and adopt
//! the leader's outcome. This is a pending-operation handle, not a lock -
//! followers never queue up to run their own exchange afterwards.
//!
//! # Fail-closed semantics
//!
//! Any refresh failure (rejected refresh token, transport error, missing
//! token) clears the session and the persisted pair. Callers observe
//! `is_authenticated() == false` immediately; no stale "authenticated"
//! state survives a failed refresh.

mod error;
mod token;

pub use error::AuthError;
pub use token::{Claims, TokenError, TokenPair, decode_claims};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::PosConfig;
use crate::store::PersistentStore;
use crate::types::{Registration, UserProfile};

use token::StoredTokenPair;

/// Store entry holding the serialized token pair.
pub(crate) const TOKENS_KEY: &str = "auth.tokens";

/// Authentication state of the one session per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    /// No credential held.
    #[default]
    Unauthenticated,
    /// A login or restore is underway.
    Authenticating,
    /// Credential held and profile fetched.
    Authenticated,
}

/// Outcome shared between coalesced refresh waiters.
///
/// Deliberately carries no error detail: a failed refresh is never surfaced
/// as a distinct user-facing error, it manifests as an involuntary logout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefreshOutcome {
    Refreshed,
    Failed,
}

#[derive(Default)]
struct SessionState {
    tokens: Option<TokenPair>,
    user: Option<UserProfile>,
    status: SessionStatus,
}

/// Session lifecycle manager. Cheap to clone; all clones share one session.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    http: reqwest::Client,
    base_url: Url,
    store: Arc<dyn PersistentStore>,
    state: Mutex<SessionState>,
    /// Bumped on every login and logout so a refresh that raced either one
    /// discards its outcome instead of resurrecting a dead session.
    epoch: AtomicU64,
    /// Pending-outcome handle for the refresh currently in flight, if any.
    inflight: Mutex<Option<watch::Receiver<Option<RefreshOutcome>>>>,
}

impl SessionManager {
    /// Create a session manager over the given store.
    ///
    /// The manager issues its own requests directly - login, refresh, and
    /// profile fetch must not pass through the retrying [`crate::ApiClient`],
    /// or a refresh failure could recurse into another refresh.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be created. This should never happen
    /// under normal circumstances as we use standard TLS configuration.
    #[must_use]
    pub fn new(config: &PosConfig, store: Arc<dyn PersistentStore>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            inner: Arc::new(SessionInner {
                http,
                base_url: config.api_base_url.clone(),
                store,
                state: Mutex::new(SessionState::default()),
                epoch: AtomicU64::new(0),
                inflight: Mutex::new(None),
            }),
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Whether an authenticated session is currently held.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.lock_state().status == SessionStatus::Authenticated
    }

    /// Current session status.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.lock_state().status
    }

    /// Profile of the authenticated user, if any.
    #[must_use]
    pub fn current_user(&self) -> Option<UserProfile> {
        self.lock_state().user.clone()
    }

    /// Current access token for bearer injection, if any.
    #[must_use]
    pub(crate) fn access_token(&self) -> Option<SecretString> {
        self.lock_state().tokens.as_ref().map(|t| t.access.clone())
    }

    /// Claims of the current access token, when one is held and readable.
    #[must_use]
    pub(crate) fn access_claims(&self) -> Option<Claims> {
        self.lock_state()
            .tokens
            .as_ref()
            .and_then(|t| t.access_claims().ok())
    }

    // =========================================================================
    // Login / logout / register
    // =========================================================================

    /// Authenticate with username and password.
    ///
    /// On success the token pair is persisted, the profile is fetched, and
    /// the session becomes `Authenticated`. The transition is complete only
    /// once the profile fetch succeeds; a profile failure after a granted
    /// token logs back out and reports the failure.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the server rejects the
    /// pair, `AuthError::Network` on transport failure.
    #[instrument(skip(self, password), fields(username = %username))]
    pub async fn login(&self, username: &str, password: &SecretString) -> Result<(), AuthError> {
        {
            let mut state = self.lock_state();
            state.status = SessionStatus::Authenticating;
            state.user = None;
        }

        let pair = match self.request_token_pair(username, password).await {
            Ok(pair) => pair,
            Err(e) => {
                self.lock_state().status = SessionStatus::Unauthenticated;
                return Err(e);
            }
        };

        // New credential generation: outcomes of refreshes started under the
        // previous credential must not commit over this one.
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);

        if let Err(e) = self.persist_pair(&pair) {
            self.lock_state().status = SessionStatus::Unauthenticated;
            return Err(e);
        }
        self.lock_state().tokens = Some(pair);

        match self.fetch_profile().await {
            Ok(profile) => {
                let mut state = self.lock_state();
                state.user = Some(profile);
                state.status = SessionStatus::Authenticated;
                info!("login complete");
                Ok(())
            }
            Err(e) => {
                // A token the server will not serve a profile for is treated
                // as invalid regardless of its claimed expiry.
                warn!(error = %e, "profile fetch after login failed");
                self.logout();
                Err(e)
            }
        }
    }

    /// Register a new account. Does not log the user in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Registration` with the server's reason if the
    /// registration is rejected, `AuthError::Network` on transport failure.
    #[instrument(skip(self, registration), fields(username = %registration.username))]
    pub async fn register(&self, registration: &Registration) -> Result<UserProfile, AuthError> {
        let response = self
            .inner
            .http
            .post(self.endpoint("api/register/"))
            .json(registration)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        if status == StatusCode::BAD_REQUEST {
            let body: RejectionBody = response.json().await.unwrap_or_default();
            return Err(AuthError::Registration(
                body.message("Registration rejected"),
            ));
        }

        Err(AuthError::UnexpectedStatus(status))
    }

    /// Clear the session and the persisted token pair.
    ///
    /// Unconditional: never fails, safe from any state, and safe to call
    /// while a refresh is in flight - the refresh's eventual success is
    /// discarded rather than re-authenticating.
    pub fn logout(&self) {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);

        if let Err(e) = self.inner.store.remove(TOKENS_KEY) {
            // The in-memory session is cleared regardless; a stale entry on
            // disk is discarded at next restore when its claims are expired.
            warn!(error = %e, "failed to remove persisted tokens");
        }

        let mut state = self.lock_state();
        state.tokens = None;
        state.user = None;
        state.status = SessionStatus::Unauthenticated;
        debug!("session cleared");
    }

    // =========================================================================
    // Startup restore
    // =========================================================================

    /// Restore a persisted session at startup.
    ///
    /// Reads the persisted pair; if absent (or unreadable - unversioned
    /// entries from an incompatible build are treated as absent) the session
    /// stays unauthenticated. An expired access token is exchanged via
    /// [`Self::refresh`]; a live one is validated by fetching the profile.
    /// Every failure path ends in logout, so this returns whether the
    /// session was restored rather than an error.
    #[instrument(skip(self))]
    pub async fn restore_session(&self) -> bool {
        let stored = match self.inner.store.get(TOKENS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return false,
            Err(e) => {
                warn!(error = %e, "token store unreadable");
                return false;
            }
        };

        let pair: TokenPair = match serde_json::from_str::<StoredTokenPair>(&stored) {
            Ok(stored) => stored.into(),
            Err(e) => {
                warn!(error = %e, "discarding undecodable token entry");
                self.logout();
                return false;
            }
        };

        let claims = match pair.access_claims() {
            Ok(claims) => claims,
            Err(e) => {
                warn!(error = %e, "discarding unreadable access token");
                self.logout();
                return false;
            }
        };

        {
            let mut state = self.lock_state();
            state.status = SessionStatus::Authenticating;
            state.tokens = Some(pair);
        }

        if claims.is_expired() {
            debug!("persisted access token expired; refreshing");
            if self.refresh().await.is_err() {
                return false;
            }
        }

        match self.fetch_profile().await {
            Ok(profile) => {
                let mut state = self.lock_state();
                state.user = Some(profile);
                state.status = SessionStatus::Authenticated;
                info!("session restored");
                true
            }
            Err(e) => {
                warn!(error = %e, "persisted token rejected by server");
                self.logout();
                false
            }
        }
    }

    // =========================================================================
    // Refresh
    // =========================================================================

    /// Exchange the refresh token for a new access token, coalescing with
    /// any refresh already in flight.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotAuthenticated` if the refresh fails for any
    /// reason; the session has already been logged out by then.
    pub async fn refresh(&self) -> Result<(), AuthError> {
        enum Role {
            Lead(watch::Sender<Option<RefreshOutcome>>),
            Follow(watch::Receiver<Option<RefreshOutcome>>),
        }

        let role = {
            let mut inflight = self
                .inner
                .inflight
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            if let Some(rx) = inflight.as_ref() {
                Role::Follow(rx.clone())
            } else {
                let (tx, rx) = watch::channel(None);
                *inflight = Some(rx);
                Role::Lead(tx)
            }
        };

        let outcome = match role {
            Role::Lead(tx) => {
                let outcome = self.run_refresh().await;
                *self
                    .inner
                    .inflight
                    .lock()
                    .unwrap_or_else(|e| e.into_inner()) = None;
                // Failure here only means no follower is waiting.
                let _ = tx.send(Some(outcome));
                outcome
            }
            Role::Follow(mut rx) => {
                debug!("attaching to in-flight refresh");
                match rx.wait_for(|outcome| outcome.is_some()).await {
                    Ok(value) => (*value).unwrap_or(RefreshOutcome::Failed),
                    Err(_) => RefreshOutcome::Failed,
                }
            }
        };

        match outcome {
            RefreshOutcome::Refreshed => Ok(()),
            RefreshOutcome::Failed => Err(AuthError::NotAuthenticated),
        }
    }

    /// Leader half of the coalesced refresh.
    #[instrument(skip(self))]
    async fn run_refresh(&self) -> RefreshOutcome {
        let epoch = self.inner.epoch.load(Ordering::SeqCst);

        let Some(refresh_token) = self
            .lock_state()
            .tokens
            .as_ref()
            .map(|t| t.refresh.clone())
        else {
            debug!("no refresh token held");
            self.logout();
            return RefreshOutcome::Failed;
        };

        let access = match self.exchange_refresh_token(&refresh_token).await {
            Ok(access) => access,
            Err(e) => {
                // A transport failure is treated the same as an explicit
                // rejection: fail closed rather than retry indefinitely.
                warn!(error = %e, "token refresh failed");
                if self.inner.epoch.load(Ordering::SeqCst) == epoch {
                    self.logout();
                }
                return RefreshOutcome::Failed;
            }
        };

        if let Err(e) = decode_claims(&access) {
            warn!(error = %e, "refreshed access token unreadable");
            if self.inner.epoch.load(Ordering::SeqCst) == epoch {
                self.logout();
            }
            return RefreshOutcome::Failed;
        }

        let pair = TokenPair {
            access: SecretString::from(access),
            refresh: refresh_token,
        };

        {
            let mut state = self.lock_state();
            if self.inner.epoch.load(Ordering::SeqCst) != epoch {
                // A logout (or new login) won the race; this outcome must
                // not re-authenticate.
                info!("discarding refresh outcome; session changed while in flight");
                return RefreshOutcome::Failed;
            }
            if let Err(e) = self.persist_pair(&pair) {
                warn!(error = %e, "failed to persist refreshed tokens");
                state.tokens = None;
                state.user = None;
                state.status = SessionStatus::Unauthenticated;
                return RefreshOutcome::Failed;
            }
            state.tokens = Some(pair);
        }

        debug!("access token refreshed");
        RefreshOutcome::Refreshed
    }

    // =========================================================================
    // Wire calls (bypass the retrying client by construction)
    // =========================================================================

    async fn request_token_pair(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<TokenPair, AuthError> {
        let response = self
            .inner
            .http
            .post(self.endpoint("api/token/"))
            .json(&TokenRequest {
                username,
                password: password.expose_secret(),
            })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let body: TokenResponse = response.json().await?;
            return Ok(TokenPair {
                access: SecretString::from(body.access),
                refresh: SecretString::from(body.refresh),
            });
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::BAD_REQUEST {
            return Err(AuthError::InvalidCredentials);
        }

        Err(AuthError::UnexpectedStatus(status))
    }

    async fn exchange_refresh_token(
        &self,
        refresh_token: &SecretString,
    ) -> Result<String, AuthError> {
        let response = self
            .inner
            .http
            .post(self.endpoint("api/token/refresh/"))
            .json(&RefreshRequest {
                refresh: refresh_token.expose_secret(),
            })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let body: RefreshResponse = response.json().await?;
            return Ok(body.access);
        }

        Err(AuthError::UnexpectedStatus(status))
    }

    async fn fetch_profile(&self) -> Result<UserProfile, AuthError> {
        let Some(access) = self.access_token() else {
            return Err(AuthError::NotAuthenticated);
        };

        let response = self
            .inner
            .http
            .get(self.endpoint("api/profile/"))
            .bearer_auth(access.expose_secret())
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AuthError::NotAuthenticated);
        }

        Err(AuthError::UnexpectedStatus(status))
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn persist_pair(&self, pair: &TokenPair) -> Result<(), AuthError> {
        let raw = serde_json::to_string(&StoredTokenPair::from(pair))
            .map_err(TokenError::Claims)?;
        self.inner.store.put(TOKENS_KEY, &raw)?;
        Ok(())
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.inner.base_url.as_str().trim_end_matches('/'),
            path
        )
    }
}

/// Request body for `POST /api/token/`.
#[derive(Serialize)]
struct TokenRequest<'a> {
    username: &'a str,
    password: &'a str,
}

/// Response from `POST /api/token/`.
#[derive(Deserialize)]
struct TokenResponse {
    access: String,
    refresh: String,
}

/// Request body for `POST /api/token/refresh/`.
#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

/// Response from `POST /api/token/refresh/`.
#[derive(Deserialize)]
struct RefreshResponse {
    access: String,
}

/// Error body the backend attaches to 400-class responses.
#[derive(Deserialize, Default)]
struct RejectionBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

impl RejectionBody {
    fn message(self, fallback: &str) -> String {
        self.error
            .or(self.detail)
            .unwrap_or_else(|| fallback.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::path::PathBuf;

    fn manager_with_store(store: Arc<MemoryStore>) -> SessionManager {
        let config = PosConfig::with_base_url(
            Url::parse("http://127.0.0.1:9").expect("url"),
            PathBuf::from("/unused"),
        );
        SessionManager::new(&config, store)
    }

    #[test]
    fn test_starts_unauthenticated() {
        let manager = manager_with_store(Arc::new(MemoryStore::new()));
        assert!(!manager.is_authenticated());
        assert_eq!(manager.status(), SessionStatus::Unauthenticated);
        assert!(manager.current_user().is_none());
    }

    #[test]
    fn test_logout_from_any_state_is_safe() {
        let manager = manager_with_store(Arc::new(MemoryStore::new()));
        manager.logout();
        manager.logout();
        assert!(!manager.is_authenticated());
    }

    #[test]
    fn test_logout_clears_persisted_tokens() {
        let store = Arc::new(MemoryStore::new());
        store
            .put(TOKENS_KEY, r#"{"access":"a","refresh":"r"}"#)
            .expect("seed");

        let manager = manager_with_store(Arc::clone(&store));
        manager.logout();

        assert!(store.get(TOKENS_KEY).expect("get").is_none());
    }

    #[tokio::test]
    async fn test_restore_with_empty_store_stays_unauthenticated() {
        let manager = manager_with_store(Arc::new(MemoryStore::new()));
        assert!(!manager.restore_session().await);
        assert_eq!(manager.status(), SessionStatus::Unauthenticated);
    }

    #[tokio::test]
    async fn test_restore_discards_undecodable_entry() {
        let store = Arc::new(MemoryStore::new());
        store.put(TOKENS_KEY, "not json").expect("seed");

        let manager = manager_with_store(Arc::clone(&store));
        assert!(!manager.restore_session().await);
        // Treated as absent, per the unversioned-snapshot rule.
        assert!(store.get(TOKENS_KEY).expect("get").is_none());
        assert!(!manager.is_authenticated());
    }

    #[tokio::test]
    async fn test_restore_discards_non_jwt_access_token() {
        let store = Arc::new(MemoryStore::new());
        store
            .put(TOKENS_KEY, r#"{"access":"opaque","refresh":"r"}"#)
            .expect("seed");

        let manager = manager_with_store(Arc::clone(&store));
        assert!(!manager.restore_session().await);
        assert!(!manager.is_authenticated());
    }

    #[tokio::test]
    async fn test_refresh_without_tokens_fails_and_logs_out() {
        let manager = manager_with_store(Arc::new(MemoryStore::new()));
        assert!(manager.refresh().await.is_err());
        assert!(!manager.is_authenticated());
    }
}
