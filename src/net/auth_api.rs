//! REST helpers for `/login`, `/signup`, and `/me`.
//!
//! No local state: each call maps one request to one typed response and lets
//! errors bubble to the caller unmodified.

#![allow(clippy::module_name_repetitions)]

#[cfg(test)]
#[path = "auth_api_test.rs"]
mod auth_api_test;

use async_trait::async_trait;
use reqwest::Method;

use super::http::{ApiClient, read_json};
use super::types::{AuthResponse, LoginData, SignupData, SignupResponse, User};
use crate::error::ApiError;

/// Authentication operations the auth context depends on.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Exchange credentials for a bearer token.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Auth`] when the credentials are rejected.
    async fn login(&self, data: &LoginData) -> Result<AuthResponse, ApiError>;

    /// Create an account. Does not log in.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] or [`ApiError::Conflict`] depending on
    /// the backend's rejection.
    async fn signup(&self, data: &SignupData) -> Result<SignupResponse, ApiError>;

    /// Fetch the user behind the stored token.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Auth`] when the token is missing or invalid.
    async fn current_user(&self) -> Result<User, ApiError>;

    /// Fetch the user behind `token`, ignoring whatever is stored.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Auth`] when the token is invalid.
    async fn current_user_with_token(&self, token: &str) -> Result<User, ApiError>;
}

/// [`AuthBackend`] over HTTP.
#[derive(Clone, Debug)]
pub struct AuthApi {
    client: ApiClient,
}

impl AuthApi {
    #[must_use]
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AuthBackend for AuthApi {
    async fn login(&self, data: &LoginData) -> Result<AuthResponse, ApiError> {
        tracing::debug!(username = %data.username, "login request");
        let request = self.client.request(Method::POST, "/login").json(data);
        read_json(self.client.send(request).await?).await
    }

    async fn signup(&self, data: &SignupData) -> Result<SignupResponse, ApiError> {
        tracing::debug!(username = %data.username, "signup request");
        let request = self.client.request(Method::POST, "/signup").json(data);
        read_json(self.client.send(request).await?).await
    }

    async fn current_user(&self) -> Result<User, ApiError> {
        let request = self.client.request(Method::GET, "/me");
        read_json(self.client.send(request).await?).await
    }

    async fn current_user_with_token(&self, token: &str) -> Result<User, ApiError> {
        let request = self.client.request(Method::GET, "/me");
        read_json(self.client.send_with_token(request, token).await?).await
    }
}
