//! Application wiring: one session store, one HTTP client, and the services
//! and state built on top of them.

#[cfg(test)]
#[path = "app_test.rs"]
mod app_test;

use std::sync::{Arc, OnceLock, Weak};

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::net::auth_api::AuthApi;
use crate::net::http::{ApiClient, SessionExpiredHook};
use crate::net::todo_api::TodoApi;
use crate::state::auth::AuthContext;
use crate::state::dashboard::Dashboard;
use crate::state::session::SessionStore;
use crate::util::notify::Notifier;

/// Shared handles for one process.
pub struct App {
    pub config: ClientConfig,
    pub session: SessionStore,
    pub auth: Arc<AuthContext>,
    pub todos: Arc<TodoApi>,
    notifier: Arc<dyn Notifier>,
}

impl App {
    /// Wire everything against the session file named in `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        config: ClientConfig,
        on_session_expired: SessionExpiredHook,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, ApiError> {
        let session = SessionStore::file(config.session_file.clone());
        Self::with_session(config, session, on_session_expired, notifier)
    }

    /// Wire everything against an explicit session store.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_session(
        config: ClientConfig,
        session: SessionStore,
        on_session_expired: SessionExpiredHook,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, ApiError> {
        // The client's 401 handler must reach the context built on top of it.
        let expire_target: Arc<OnceLock<Weak<AuthContext>>> = Arc::new(OnceLock::new());
        let target = expire_target.clone();
        let hook: SessionExpiredHook = Arc::new(move || {
            if let Some(auth) = target.get().and_then(Weak::upgrade) {
                auth.expire();
            }
            on_session_expired();
        });

        let client = ApiClient::new(&config, session.clone(), hook)?;
        let auth = Arc::new(AuthContext::new(
            session.clone(),
            Arc::new(AuthApi::new(client.clone())),
            notifier.clone(),
        ));
        if expire_target.set(Arc::downgrade(&auth)).is_err() {
            tracing::warn!("session-expiry target already bound");
        }
        let todos = Arc::new(TodoApi::new(client));
        tracing::debug!(api_url = %config.api_url, "app wired");
        Ok(Self { config, session, auth, todos, notifier })
    }

    /// A fresh dashboard over the shared todo service.
    #[must_use]
    pub fn dashboard(&self) -> Dashboard {
        Dashboard::new(self.todos.clone(), self.notifier.clone())
    }
}
