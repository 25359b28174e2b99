//! Auth-session state for the current user.
//!
//! SYSTEM CONTEXT
//! ==============
//! Used by route guards and user-aware commands to coordinate login prompts
//! and identity-dependent output. One `AuthContext` exists per process; it
//! restores itself from the session store once at startup and owns every
//! mutation of `user` and `loading` afterwards.
//!
//! DESIGN
//! ======
//! State is published through a `watch` channel so observers always see the
//! latest snapshot. `loading` is only ever raised through [`LoadingGuard`],
//! whose drop lowers it again on every exit path, including cancellation.

#[cfg(test)]
#[path = "auth_test.rs"]
mod auth_test;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;

use crate::error::{ApiError, StorageError};
use crate::net::auth_api::AuthBackend;
use crate::net::types::{LoginData, SignupData, SignupResponse, User};
use crate::state::session::SessionStore;
use crate::util::notify::Notifier;

/// Authentication state tracking the current user and loading status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthState {
    pub user: Option<User>,
    pub loading: bool,
}

impl Default for AuthState {
    /// Auth status is unknown until initialization finishes.
    fn default() -> Self {
        Self { user: None, loading: true }
    }
}

/// What the presentation layer should render for an [`AuthState`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthStatus {
    /// Still loading; render neither the authenticated nor the anonymous view.
    Unknown,
    Authenticated,
    Unauthenticated,
}

impl AuthState {
    /// Derived from `user`; never stored separately.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    #[must_use]
    pub fn status(&self) -> AuthStatus {
        match (self.loading, self.is_authenticated()) {
            (true, _) => AuthStatus::Unknown,
            (false, true) => AuthStatus::Authenticated,
            (false, false) => AuthStatus::Unauthenticated,
        }
    }
}

/// Whether a guarded view should send the user to login.
#[must_use]
pub fn should_redirect_unauth(state: &AuthState) -> bool {
    !state.loading && state.user.is_none()
}

/// Holds `loading = true` for its lifetime.
struct LoadingGuard<'a> {
    state: &'a watch::Sender<AuthState>,
}

impl<'a> LoadingGuard<'a> {
    fn acquire(state: &'a watch::Sender<AuthState>) -> Self {
        state.send_if_modified(|s| !std::mem::replace(&mut s.loading, true));
        Self { state }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.state.send_if_modified(|s| std::mem::replace(&mut s.loading, false));
    }
}

pub struct AuthContext {
    session: SessionStore,
    api: Arc<dyn AuthBackend>,
    notifier: Arc<dyn Notifier>,
    state: watch::Sender<AuthState>,
    initialized: AtomicBool,
}

impl AuthContext {
    #[must_use]
    pub fn new(session: SessionStore, api: Arc<dyn AuthBackend>, notifier: Arc<dyn Notifier>) -> Self {
        let (state, _) = watch::channel(AuthState::default());
        Self { session, api, notifier, state, initialized: AtomicBool::new(false) }
    }

    /// Current snapshot.
    #[must_use]
    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.state.borrow().user.clone()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    /// Observe every state change from now on.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Restore the persisted session and verify it against `/me`.
    ///
    /// Runs once per context; later calls return immediately. A stale or
    /// unreadable session is discarded quietly, without a notice.
    pub async fn initialize(&self) {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return;
        }
        let _loading = LoadingGuard::acquire(&self.state);

        let session = match self.session.load() {
            Ok(Some(session)) => session,
            Ok(None) => {
                tracing::debug!("no persisted session");
                return;
            }
            Err(error) => {
                tracing::warn!(%error, "persisted session unreadable; discarding");
                self.discard_session();
                return;
            }
        };

        // Show the cached profile while the token is being checked.
        self.set_user(Some(session.user.clone()));

        match self.api.current_user().await {
            Ok(fresh) => {
                if let Err(error) = self.session.save(&session.token, &fresh) {
                    tracing::warn!(%error, "failed to refresh cached profile");
                }
                tracing::debug!(user_id = fresh.id, "session verified");
                self.set_user(Some(fresh));
            }
            Err(error) => {
                tracing::info!(%error, "persisted session rejected; logging out");
                self.discard_session();
            }
        }
    }

    /// Log in and load the full profile from `/me`.
    ///
    /// `user` is only touched on success. Token and profile are persisted
    /// together once both are known.
    ///
    /// # Errors
    ///
    /// Returns the failing step's error after raising an error notice.
    pub async fn login(&self, data: &LoginData) -> Result<User, ApiError> {
        let _loading = LoadingGuard::acquire(&self.state);
        match self.try_login(data).await {
            Ok(user) => {
                self.notifier.success("Successfully logged in!");
                Ok(user)
            }
            Err(error) => {
                tracing::debug!(%error, "login failed");
                self.notifier.error(error.detail().unwrap_or("Login failed"));
                Err(error)
            }
        }
    }

    async fn try_login(&self, data: &LoginData) -> Result<User, ApiError> {
        let auth = self.api.login(data).await?;
        let user = self.api.current_user_with_token(&auth.access_token).await?;
        self.session.save(&auth.access_token, &user)?;
        tracing::info!(user_id = user.id, username = %user.username, "logged in");
        self.set_user(Some(user.clone()));
        Ok(user)
    }

    /// Create an account. Does not log in.
    ///
    /// # Errors
    ///
    /// Returns the backend rejection after raising an error notice.
    pub async fn signup(&self, data: &SignupData) -> Result<SignupResponse, ApiError> {
        let _loading = LoadingGuard::acquire(&self.state);
        match self.api.signup(data).await {
            Ok(created) => {
                tracing::info!(user_id = created.user_id, "account created");
                self.notifier.success("Account created successfully! Please log in.");
                Ok(created)
            }
            Err(error) => {
                tracing::debug!(%error, "signup failed");
                self.notifier.error(error.detail().unwrap_or("Signup failed"));
                Err(error)
            }
        }
    }

    /// End the session locally. No backend call.
    ///
    /// `user` is cleared even if the store cannot be written.
    ///
    /// # Errors
    ///
    /// Returns the storage error, if clearing the store failed.
    pub fn logout(&self) -> Result<(), StorageError> {
        let cleared = self.session.clear();
        self.set_user(None);
        self.notifier.success("Successfully logged out!");
        cleared
    }

    /// Drop the in-memory user after the HTTP client saw a 401.
    ///
    /// The client has already cleared the store; no notice is raised.
    pub fn expire(&self) {
        tracing::debug!("session expired; dropping user");
        self.set_user(None);
    }

    fn discard_session(&self) {
        if let Err(error) = self.session.clear() {
            tracing::warn!(%error, "failed to clear session");
        }
        self.set_user(None);
    }

    fn set_user(&self, user: Option<User>) {
        self.state.send_if_modified(|s| {
            if s.user == user {
                return false;
            }
            s.user = user;
            true
        });
    }
}
