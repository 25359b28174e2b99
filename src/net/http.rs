//! Authenticated transport shared by every REST service.
//!
//! SYSTEM CONTEXT
//! ==============
//! Services build requests with [`ApiClient::request`] and send them through
//! [`ApiClient::send`], which attaches the stored bearer token. A 401 from
//! any endpoint means the session died: the store is cleared and the injected
//! session-expired hook runs before the error reaches the caller.
//!
//! ERROR HANDLING
//! ==============
//! Non-401 responses are handed back untouched; services decide how to read
//! them with [`read_json`] / [`read_ack`].

#[cfg(test)]
#[path = "http_test.rs"]
mod http_test;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::config::ClientConfig;
use crate::error::{ApiError, detail_message};
use crate::state::session::SessionStore;

/// Called after a 401 wiped the session; stands in for "go to the login page".
pub type SessionExpiredHook = Arc<dyn Fn() + Send + Sync>;

/// A hook that only logs.
#[must_use]
pub fn log_session_expired() -> SessionExpiredHook {
    Arc::new(|| tracing::warn!("session expired; login required"))
}

/// Remembers that a 401 expired the session so a caller can report it later,
/// only where the session actually mattered.
#[derive(Clone, Debug, Default)]
pub struct ExpiryFlag(Arc<AtomicBool>);

impl ExpiryFlag {
    /// A hook that raises this flag.
    #[must_use]
    pub fn hook(&self) -> SessionExpiredHook {
        let flag = self.0.clone();
        Arc::new(move || {
            tracing::info!("session expired");
            flag.store(true, Ordering::SeqCst);
        })
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: SessionStore,
    on_session_expired: SessionExpiredHook,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Build a client for `config.api_url` using `session` for bearer tokens.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client fails to build.
    pub fn new(
        config: &ClientConfig,
        session: SessionStore,
        on_session_expired: SessionExpiredHook,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        Ok(Self { http, base_url: config.api_url.clone(), session, on_session_expired })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a backend path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    /// Start a request to `path`; nothing is attached until [`Self::send`].
    #[must_use]
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, self.url(path))
    }

    /// Send with the stored token, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Auth`] on 401 (after clearing the session),
    /// [`ApiError::Network`] if the backend was unreachable, or
    /// [`ApiError::Storage`] if the token could not be read.
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let token = self.session.token()?;
        self.dispatch(request, token.as_deref()).await
    }

    /// Send with an explicit token instead of the stored one.
    ///
    /// # Errors
    ///
    /// Same as [`Self::send`].
    pub async fn send_with_token(&self, request: RequestBuilder, token: &str) -> Result<Response, ApiError> {
        self.dispatch(request, Some(token)).await
    }

    async fn dispatch(&self, request: RequestBuilder, token: Option<&str>) -> Result<Response, ApiError> {
        let request = match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request.send().await.map_err(|e| {
            if e.is_builder() {
                ApiError::InvalidRequest(e.to_string())
            } else {
                ApiError::Network(e.to_string())
            }
        })?;

        if response.status() == StatusCode::UNAUTHORIZED {
            let url = response.url().path().to_owned();
            let body = response.text().await.unwrap_or_default();
            self.expire_session(&url);
            let message = detail_message(&body).unwrap_or_else(|| "could not validate credentials".to_owned());
            return Err(ApiError::Auth(message));
        }

        Ok(response)
    }

    fn expire_session(&self, path: &str) {
        tracing::info!(%path, "unauthorized response; clearing session");
        if let Err(error) = self.session.clear() {
            tracing::warn!(%error, "failed to clear session after 401");
        }
        (self.on_session_expired)();
    }
}

/// Decode a success body as JSON, or fold an error status into [`ApiError`].
///
/// # Errors
///
/// Returns the mapped status error, or [`ApiError::Decode`] for a bad body.
pub async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    let body = response.text().await.map_err(ApiError::from)?;
    if !status.is_success() {
        return Err(ApiError::from_status(status.as_u16(), &body));
    }
    serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Check the status and discard the body.
///
/// # Errors
///
/// Returns the mapped status error.
pub async fn read_ack(response: Response) -> Result<(), ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::from_status(status.as_u16(), &body))
}

/// Read a success body as raw bytes.
///
/// # Errors
///
/// Returns the mapped status error or a transport error while reading.
pub async fn read_bytes(response: Response) -> Result<Vec<u8>, ApiError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::from_status(status.as_u16(), &body));
    }
    Ok(response.bytes().await.map_err(ApiError::from)?.to_vec())
}

pub(crate) fn join_url(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}
