//! Resilient authenticated request client.
//!
//! Every outbound call to the backend goes through [`ApiClient::send`],
//! which attaches the current bearer credential and recovers transparently
//! from exactly one class of failure: credential staleness. On an
//! authorization failure it runs the session's coalesced refresh and
//! re-dispatches the original request once; a second authorization failure
//! (or a failed refresh, which has already logged the session out)
//! surfaces as [`ApiError::AuthorizationExpired`].
//!
//! The retry allowance is an explicit budget threaded through the send
//! loop, not hidden state on the request, so a request can never be
//! retried more than once no matter how many times it fails.

mod catalog;
mod error;

pub use error::ApiError;

use std::sync::Arc;

use reqwest::{Method, StatusCode};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::PosConfig;
use crate::session::SessionManager;

/// Number of refresh-and-retry attempts allowed per logical call.
const RETRY_BUDGET: u8 = 1;

/// A rebuildable description of one API call.
///
/// Kept as data (method, path, query, JSON body) rather than a built
/// `reqwest::Request` so the send loop can re-dispatch it after a refresh.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<serde_json::Value>,
}

impl ApiRequest {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    /// A GET request for `path` (relative to the API base URL).
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// A POST request for `path`.
    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// A PUT request for `path`.
    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    /// A DELETE request for `path`.
    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Append a query parameter.
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Attach a JSON body.
    #[must_use]
    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Authenticated HTTP client with single-retry refresh recovery.
///
/// Cheap to clone; clones share one connection pool and one session.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    http: reqwest::Client,
    base_url: Url,
    session: SessionManager,
}

impl ApiClient {
    /// Create a client bound to the given session.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be created. This should never happen
    /// under normal circumstances as we use standard TLS configuration.
    #[must_use]
    pub fn new(config: &PosConfig, session: SessionManager) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            inner: Arc::new(ApiClientInner {
                http,
                base_url: config.api_base_url.clone(),
                session,
            }),
        }
    }

    /// The session this client authenticates with.
    #[must_use]
    pub fn session(&self) -> &SessionManager {
        &self.inner.session
    }

    /// Dispatch a request, refreshing the credential and retrying once if
    /// the server rejects it as stale.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::AuthorizationExpired` if the request still fails
    /// authorization after the single retry (the session has logged out by
    /// then), or `ApiError::Http` on transport failure.
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    pub async fn send(&self, request: &ApiRequest) -> Result<reqwest::Response, ApiError> {
        // A token past its claimed validity window is never presented to the
        // server; exchange it up front. The refresh is coalesced, and if it
        // fails the session has logged out and the request goes out bare.
        if let Some(claims) = self.inner.session.access_claims()
            && claims.is_expired()
        {
            debug!("access token past its window; refreshing before dispatch");
            let _ = self.inner.session.refresh().await;
        }

        let mut retries_left = RETRY_BUDGET;

        loop {
            let response = self.dispatch(request).await?;

            if response.status() != StatusCode::UNAUTHORIZED {
                return Ok(response);
            }

            if retries_left > 0 {
                retries_left -= 1;
                debug!("authorization failure; refreshing credential");
                if self.inner.session.refresh().await.is_ok() {
                    continue;
                }
            }

            // Either the retry budget is spent or the refresh failed (and
            // the session manager has already run its logout path). Either
            // way the original authorization failure is what propagates.
            return Err(ApiError::AuthorizationExpired);
        }
    }

    /// `send` plus JSON decoding of a success response.
    ///
    /// # Errors
    ///
    /// As [`Self::send`], plus `ApiError::NotFound` on 404 and
    /// `ApiError::UnexpectedStatus` for other non-success responses.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: &ApiRequest,
    ) -> Result<T, ApiError> {
        let response = self.send(request).await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound(request.path.clone()));
        }

        let body = response.text().await.unwrap_or_default();
        warn!(
            status = %status,
            body = %body.chars().take(500).collect::<String>(),
            "backend returned non-success status"
        );
        Err(ApiError::UnexpectedStatus { status, body })
    }

    /// Build and fire one attempt, attaching the current bearer credential
    /// if one exists. Requests issued with no token are sent as-is; the
    /// server decides whether authorization was required.
    async fn dispatch(&self, request: &ApiRequest) -> Result<reqwest::Response, ApiError> {
        let url = format!(
            "{}/{}",
            self.inner.base_url.as_str().trim_end_matches('/'),
            request.path
        );

        let mut builder = self.inner.http.request(request.method.clone(), url);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        if let Some(access) = self.inner.session.access_token() {
            builder = builder.bearer_auth(access.expose_secret());
        }

        Ok(builder.send().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = ApiRequest::get("api/products/search/")
            .query("q", "espresso")
            .query("page", "2");

        assert_eq!(request.method, Method::GET);
        assert_eq!(request.path, "api/products/search/");
        assert_eq!(
            request.query,
            vec![
                ("q".to_string(), "espresso".to_string()),
                ("page".to_string(), "2".to_string())
            ]
        );
        assert!(request.body.is_none());
    }

    #[test]
    fn test_request_body_is_rebuildable() {
        let request = ApiRequest::post("api/sales/create/")
            .json(serde_json::json!({"total_amount": "10.00"}));

        // Cloning keeps the body; the send loop relies on this to
        // re-dispatch after a refresh.
        let clone = request.clone();
        assert_eq!(clone.body, request.body);
    }
}
