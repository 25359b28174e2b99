//! Dashboard state: the current user's todo list and its mutations.
//!
//! SYSTEM CONTEXT
//! ==============
//! Rendered by the `todos` commands after the auth context has settled.
//! Local items change only after the backend confirms a mutation, so a
//! failed call never leaves the list diverged from server truth.

#[cfg(test)]
#[path = "dashboard_test.rs"]
mod dashboard_test;

use std::sync::Arc;

use crate::error::ApiError;
use crate::net::todo_api::TodoBackend;
use crate::net::types::{Todo, TodoDraft, TodoUpdate};
use crate::state::auth::AuthState;
use crate::util::notify::Notifier;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DashboardState {
    /// Newest first.
    pub items: Vec<Todo>,
    pub loading: bool,
    /// Whether the initial fetch has run.
    pub fetched: bool,
    pub create_pending: bool,
    /// Last fetch failure, shown inline rather than as a notice.
    pub error: Option<String>,
}

/// Completion summary for the progress bar.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub pending: usize,
    pub total: usize,
    pub percent: u8,
}

impl Progress {
    #[must_use]
    pub fn of(items: &[Todo]) -> Self {
        let total = items.len();
        let completed = items.iter().filter(|t| t.is_completed).count();
        Self { completed, pending: total - completed, total, percent: percent(completed, total) }
    }
}

/// Rounded half-up; 0 for an empty list.
fn percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let rounded = (completed * 200 + total) / (total * 2);
    u8::try_from(rounded).unwrap_or(100)
}

pub struct Dashboard {
    api: Arc<dyn TodoBackend>,
    notifier: Arc<dyn Notifier>,
    state: DashboardState,
}

impl Dashboard {
    #[must_use]
    pub fn new(api: Arc<dyn TodoBackend>, notifier: Arc<dyn Notifier>) -> Self {
        Self { api, notifier, state: DashboardState::default() }
    }

    #[must_use]
    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    #[must_use]
    pub fn todos(&self) -> &[Todo] {
        &self.state.items
    }

    #[must_use]
    pub fn progress(&self) -> Progress {
        Progress::of(&self.state.items)
    }

    /// Fetch the list once, if the user is authenticated.
    pub async fn mount(&mut self, auth: &AuthState) {
        if self.state.fetched || !auth.is_authenticated() {
            return;
        }
        self.refresh().await;
    }

    /// Re-fetch the list. Failures are logged and kept in `error`.
    pub async fn refresh(&mut self) {
        self.state.loading = true;
        self.state.fetched = true;
        match self.api.list().await {
            Ok(mut items) => {
                items.sort_by(|a, b| b.id.cmp(&a.id));
                tracing::debug!(count = items.len(), "todos loaded");
                self.state.items = items;
                self.state.error = None;
            }
            Err(error) => {
                tracing::warn!(%error, "failed to load todos");
                self.state.error = Some(error.to_string());
            }
        }
        self.state.loading = false;
    }

    /// Create a todo and put it at the top of the list.
    ///
    /// # Errors
    ///
    /// Returns the backend error after raising an error notice.
    pub async fn add(&mut self, draft: &TodoDraft) -> Result<Todo, ApiError> {
        self.state.create_pending = true;
        let created = self.api.create(draft).await;
        self.state.create_pending = false;

        match created {
            Ok(todo) => {
                tracing::info!(todo_id = todo.id, "todo added");
                self.state.items.insert(0, todo.clone());
                self.notifier.success("Todo added successfully!");
                Ok(todo)
            }
            Err(error) => self.fail("Error adding todo", error),
        }
    }

    /// Flip a todo's completion flag once the backend confirms it.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] for an id not on the dashboard, or the
    /// backend error. The local list is unchanged on failure.
    pub async fn toggle(&mut self, id: i64) -> Result<bool, ApiError> {
        let Some(current) = self.find(id).map(|t| t.is_completed) else {
            return self.fail("Error updating status", missing(id));
        };
        if let Err(error) = self.api.update_status(id, !current).await {
            return self.fail("Error updating status", error);
        }
        if let Some(todo) = self.find_mut(id) {
            todo.is_completed = !current;
        }
        tracing::debug!(todo_id = id, is_completed = !current, "todo toggled");
        Ok(!current)
    }

    /// Delete a todo once the backend confirms it.
    ///
    /// # Errors
    ///
    /// Returns the backend error. The local list is unchanged on failure.
    pub async fn delete(&mut self, id: i64) -> Result<(), ApiError> {
        if let Err(error) = self.api.delete(id).await {
            return self.fail("Error deleting todo", error);
        }
        self.state.items.retain(|t| t.id != id);
        tracing::info!(todo_id = id, "todo deleted");
        self.notifier.success("Todo deleted successfully!");
        Ok(())
    }

    /// Apply a partial update and patch the local copy.
    ///
    /// A replaced image is only known to the backend, so the list is
    /// re-fetched in that case.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidRequest`] when `changes` is empty, or the
    /// backend error.
    pub async fn update(&mut self, id: i64, changes: &TodoUpdate) -> Result<(), ApiError> {
        if changes.is_empty() {
            return Err(ApiError::InvalidRequest("no changes given".into()));
        }
        if let Err(error) = self.api.update(id, changes).await {
            return self.fail("Error updating todo", error);
        }

        if changes.image.is_some() {
            self.refresh().await;
        } else if let Some(todo) = self.find_mut(id) {
            if let Some(title) = &changes.title {
                todo.title.clone_from(title);
            }
            if let Some(description) = &changes.description {
                todo.description.clone_from(description);
            }
            if let Some(flag) = changes.is_completed {
                todo.is_completed = flag;
            }
        }
        tracing::info!(todo_id = id, "todo updated");
        self.notifier.success("Todo updated successfully!");
        Ok(())
    }

    fn find(&self, id: i64) -> Option<&Todo> {
        self.state.items.iter().find(|t| t.id == id)
    }

    fn find_mut(&mut self, id: i64) -> Option<&mut Todo> {
        self.state.items.iter_mut().find(|t| t.id == id)
    }

    fn fail<T>(&self, notice: &str, error: ApiError) -> Result<T, ApiError> {
        tracing::warn!(%error, "{notice}");
        self.notifier.error(notice);
        Err(error)
    }
}

fn missing(id: i64) -> ApiError {
    ApiError::NotFound(format!("todo {id} is not on the dashboard"))
}
