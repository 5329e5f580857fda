//! Integration test support for Tillpoint.
//!
//! Provides [`FakeBackend`], an in-process axum stand-in for the real REST
//! backend, and [`TestContext`], which wires a [`SessionManager`] and
//! [`ApiClient`] against it over real HTTP.
//!
//! The fake mints unsigned JWTs (the client never verifies signatures, only
//! reads claims), tracks how many token exchanges it has served - the
//! coalescing assertions depend on that - and exposes switches to revoke
//! access tokens, fail refreshes, or slow them down to widen race windows.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p tillpoint-integration-tests
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use secrecy::SecretString;
use serde_json::{Value, json};
use url::Url;

use tillpoint_client::{ApiClient, MemoryStore, PersistentStore, PosConfig, SessionManager};

/// Username the fake backend accepts.
pub const USERNAME: &str = "demo";
/// Password the fake backend accepts.
pub const PASSWORD: &str = "demo1234";
/// Username the register endpoint reports as taken.
pub const TAKEN_USERNAME: &str = "taken";

/// Shared state behind the fake backend's routes.
#[derive(Default)]
struct BackendState {
    token_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    profile_calls: AtomicUsize,
    /// Lifetime (seconds) applied to newly minted access tokens.
    access_ttl: AtomicI64,
    /// When set, the refresh endpoint rejects every exchange.
    fail_refresh: AtomicBool,
    /// Artificial latency on the refresh endpoint, to widen race windows.
    refresh_delay_ms: AtomicU64,
    /// Access tokens the server still honors.
    issued_access: Mutex<HashSet<String>>,
    /// Refresh tokens the server still honors.
    issued_refresh: Mutex<HashSet<String>>,
    /// Payloads received by the sale-create endpoint.
    sales: Mutex<Vec<Value>>,
    seq: AtomicUsize,
}

impl BackendState {
    fn mint_access(&self) -> String {
        let ttl = self.access_ttl.load(Ordering::SeqCst);
        let token = mint_jwt(
            chrono::Utc::now().timestamp() + ttl,
            1,
            self.seq.fetch_add(1, Ordering::SeqCst),
        );
        lock(&self.issued_access).insert(token.clone());
        token
    }

    fn mint_refresh(&self) -> String {
        let token = mint_jwt(
            chrono::Utc::now().timestamp() + 86_400,
            1,
            self.seq.fetch_add(1, Ordering::SeqCst),
        );
        lock(&self.issued_refresh).insert(token.clone());
        token
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let Some(token) = bearer_token(headers) else {
            return false;
        };
        if !lock(&self.issued_access).contains(&token) {
            return false;
        }
        // Honor the claimed validity window, like the real backend.
        decoded_exp(&token).is_some_and(|exp| exp > chrono::Utc::now().timestamp())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Mint an unsigned three-part JWT with the given expiry claim.
#[must_use]
pub fn mint_jwt(exp: i64, user_id: i64, jti: usize) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD
        .encode(json!({ "exp": exp, "user_id": user_id, "jti": jti }).to_string());
    format!("{header}.{payload}.sig")
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(ToString::to_string)
}

fn decoded_exp(token: &str) -> Option<i64> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    let claims: Value = serde_json::from_slice(&bytes).ok()?;
    claims.get("exp")?.as_i64()
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"detail": "Given token not valid for any token type"})),
    )
        .into_response()
}

/// In-process stand-in for the REST backend.
pub struct FakeBackend {
    addr: SocketAddr,
    state: Arc<BackendState>,
}

impl FakeBackend {
    /// Start the fake on an ephemeral port.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot bind to localhost.
    pub async fn spawn() -> Self {
        let state = Arc::new(BackendState {
            access_ttl: AtomicI64::new(3600),
            ..BackendState::default()
        });

        let app = Router::new()
            .route("/api/token/", post(token_handler))
            .route("/api/token/refresh/", post(refresh_handler))
            .route("/api/profile/", get(profile_handler))
            .route("/api/register/", post(register_handler))
            .route("/api/products/", get(products_handler))
            .route("/api/products/search/", get(products_handler))
            .route("/api/products/{id}/", get(product_handler))
            .route("/api/customers/", get(customers_handler))
            .route("/api/sales/create/", post(create_sale_handler))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake backend");
        let addr = listener.local_addr().expect("local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve fake backend");
        });

        Self { addr, state }
    }

    /// Base URL the client should be pointed at.
    ///
    /// # Panics
    ///
    /// Panics if the bound address does not form a valid URL.
    #[must_use]
    pub fn base_url(&self) -> Url {
        Url::parse(&format!("http://{}", self.addr)).expect("base url")
    }

    /// Number of password grants served.
    #[must_use]
    pub fn token_calls(&self) -> usize {
        self.state.token_calls.load(Ordering::SeqCst)
    }

    /// Number of refresh exchanges served. The coalescing property asserts
    /// on this.
    #[must_use]
    pub fn refresh_calls(&self) -> usize {
        self.state.refresh_calls.load(Ordering::SeqCst)
    }

    /// Number of profile fetches served.
    #[must_use]
    pub fn profile_calls(&self) -> usize {
        self.state.profile_calls.load(Ordering::SeqCst)
    }

    /// Lifetime applied to access tokens minted from now on.
    pub fn set_access_ttl(&self, seconds: i64) {
        self.state.access_ttl.store(seconds, Ordering::SeqCst);
    }

    /// Forget every issued access token, so the next authenticated request
    /// is rejected as stale.
    pub fn revoke_access_tokens(&self) {
        lock(&self.state.issued_access).clear();
    }

    /// Make the refresh endpoint reject every exchange.
    pub fn set_fail_refresh(&self, fail: bool) {
        self.state.fail_refresh.store(fail, Ordering::SeqCst);
    }

    /// Add artificial latency to the refresh endpoint.
    pub fn set_refresh_delay(&self, delay: Duration) {
        self.state
            .refresh_delay_ms
            .store(delay.as_millis().try_into().unwrap_or(u64::MAX), Ordering::SeqCst);
    }

    /// Payloads the sale-create endpoint has received.
    ///
    /// # Panics
    ///
    /// Never panics; the lock is recovered if poisoned.
    #[must_use]
    pub fn submitted_sales(&self) -> Vec<Value> {
        lock(&self.state.sales).clone()
    }
}

// =============================================================================
// Handlers
// =============================================================================

async fn token_handler(
    State(state): State<Arc<BackendState>>,
    Json(body): Json<Value>,
) -> Response {
    state.token_calls.fetch_add(1, Ordering::SeqCst);

    let username = body.get("username").and_then(Value::as_str);
    let password = body.get("password").and_then(Value::as_str);

    if username == Some(USERNAME) && password == Some(PASSWORD) {
        let access = state.mint_access();
        let refresh = state.mint_refresh();
        Json(json!({ "access": access, "refresh": refresh })).into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "No active account found with the given credentials"})),
        )
            .into_response()
    }
}

async fn refresh_handler(
    State(state): State<Arc<BackendState>>,
    Json(body): Json<Value>,
) -> Response {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);

    let delay = state.refresh_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    if state.fail_refresh.load(Ordering::SeqCst) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Token is invalid or expired"})),
        )
            .into_response();
    }

    let presented = body.get("refresh").and_then(Value::as_str).unwrap_or("");
    if !lock(&state.issued_refresh).contains(presented) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Token is invalid or expired"})),
        )
            .into_response();
    }

    let access = state.mint_access();
    Json(json!({ "access": access })).into_response()
}

async fn profile_handler(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    state.profile_calls.fetch_add(1, Ordering::SeqCst);

    if !state.authorized(&headers) {
        return unauthorized();
    }

    Json(json!({
        "id": 1,
        "username": USERNAME,
        "email": "demo@example.com",
        "first_name": "Demo",
        "last_name": "Cashier"
    }))
    .into_response()
}

async fn register_handler(Json(body): Json<Value>) -> Response {
    let username = body.get("username").and_then(Value::as_str).unwrap_or("");

    if username == TAKEN_USERNAME {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Username already exists"})),
        )
            .into_response();
    }

    (
        StatusCode::CREATED,
        Json(json!({
            "id": 2,
            "username": username,
            "email": body.get("email").cloned().unwrap_or(Value::String(String::new())),
            "first_name": body.get("first_name").cloned().unwrap_or(Value::String(String::new())),
            "last_name": body.get("last_name").cloned().unwrap_or(Value::String(String::new())),
        })),
    )
        .into_response()
}

fn product_json(id: i64) -> Value {
    json!({
        "id": id,
        "name": format!("Product {id}"),
        "category": 1,
        "category_name": "General",
        "description": "",
        "price": "2.50",
        "stock": 40,
        "image": null,
        "barcode": null,
        "created_at": "2026-01-05T09:30:00Z",
        "updated_at": "2026-01-05T09:30:00Z"
    })
}

async fn products_handler(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    Json(json!([product_json(1), product_json(2)])).into_response()
}

async fn product_handler(
    State(state): State<Arc<BackendState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    if id > 100 {
        return (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."}))).into_response();
    }
    Json(product_json(id)).into_response()
}

async fn customers_handler(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    Json(json!([
        {"id": 1, "name": "Walk-in", "email": null, "phone": null, "address": null},
        {"id": 2, "name": "Ada Lovelace", "email": "ada@example.com", "phone": null, "address": null}
    ]))
    .into_response()
}

async fn create_sale_handler(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }

    lock(&state.sales).push(body.clone());
    let id = lock(&state.sales).len();

    (
        StatusCode::CREATED,
        Json(json!({
            "id": id,
            "reference_no": format!("SALE-{id:04}"),
            "customer": body.get("customer").cloned().unwrap_or(Value::Null),
            "customer_name": null,
            "status": "COMPLETED",
            "total_amount": body.get("total_amount").cloned().unwrap_or(Value::String("0".into())),
            "payment_method": body.get("payment_method").cloned().unwrap_or(Value::String("CASH".into())),
            "notes": body.get("notes").cloned().unwrap_or(Value::String(String::new())),
            "created_at": "2026-01-05T10:00:00Z",
            "items": []
        })),
    )
        .into_response()
}

// =============================================================================
// Test context
// =============================================================================

/// A client stack wired against a fresh [`FakeBackend`].
pub struct TestContext {
    pub backend: FakeBackend,
    pub store: Arc<dyn PersistentStore>,
    pub session: SessionManager,
    pub api: ApiClient,
}

impl TestContext {
    /// Spawn a backend and wire a session and client against it, persisting
    /// into an in-memory store.
    pub async fn new() -> Self {
        let backend = FakeBackend::spawn().await;
        let store: Arc<dyn PersistentStore> = Arc::new(MemoryStore::new());
        Self::with_store(backend, store)
    }

    /// Wire a session and client against `backend` over `store`.
    #[must_use]
    pub fn with_store(backend: FakeBackend, store: Arc<dyn PersistentStore>) -> Self {
        let config = PosConfig::with_base_url(backend.base_url(), std::env::temp_dir());
        let session = SessionManager::new(&config, Arc::clone(&store));
        let api = ApiClient::new(&config, session.clone());
        Self {
            backend,
            store,
            session,
            api,
        }
    }

    /// Log in with the fake's accepted credentials.
    ///
    /// # Panics
    ///
    /// Panics if the login fails.
    pub async fn login(&self) {
        self.session
            .login(USERNAME, &SecretString::from(PASSWORD))
            .await
            .expect("login against fake backend");
    }

    /// A second session manager over the same store, simulating a process
    /// restart.
    #[must_use]
    pub fn restarted_session(&self) -> SessionManager {
        let config = PosConfig::with_base_url(self.backend.base_url(), std::env::temp_dir());
        SessionManager::new(&config, Arc::clone(&self.store))
    }
}
