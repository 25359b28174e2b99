//! REST helpers for the `/todos` collection and attached images.
//!
//! Ownership is enforced server-side; a todo that belongs to someone else
//! surfaces as [`ApiError::NotFound`] like a missing one.

#![allow(clippy::module_name_repetitions)]

#[cfg(test)]
#[path = "todo_api_test.rs"]
mod todo_api_test;

use async_trait::async_trait;
use reqwest::Method;
use reqwest::multipart::{Form, Part};

use super::http::{ApiClient, read_ack, read_bytes, read_json};
use super::types::{CreateTodoResponse, ImageUpload, Todo, TodoDraft, TodoStatusUpdate, TodoUpdate};
use crate::error::ApiError;

/// Todo operations the dashboard depends on.
#[async_trait]
pub trait TodoBackend: Send + Sync {
    /// All todos of the current user.
    ///
    /// # Errors
    ///
    /// Returns the mapped backend error or a transport error.
    async fn list(&self) -> Result<Vec<Todo>, ApiError>;

    /// Create a todo and return the stored record.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] for rejected fields or images.
    async fn create(&self, draft: &TodoDraft) -> Result<Todo, ApiError>;

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] if the todo is missing or not owned.
    async fn update(&self, id: i64, changes: &TodoUpdate) -> Result<(), ApiError>;

    /// Set the completion flag.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] if the todo is missing or not owned.
    async fn update_status(&self, id: i64, is_completed: bool) -> Result<(), ApiError>;

    /// Delete a todo.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] if the todo is missing or not owned.
    async fn delete(&self, id: i64) -> Result<(), ApiError>;
}

/// [`TodoBackend`] over HTTP.
#[derive(Clone, Debug)]
pub struct TodoApi {
    client: ApiClient,
}

impl TodoApi {
    #[must_use]
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Resolve a stored image reference to a fetchable URL.
    ///
    /// Absolute URLs (e.g. CDN uploads) pass through; anything else is served
    /// from `/images/{basename}`.
    #[must_use]
    pub fn image_url(&self, image_ref: &str) -> Option<String> {
        resolve_image_url(self.client.base_url(), image_ref)
    }

    /// Download an attached image from `GET /images/{filename}`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] if the image does not exist.
    pub async fn fetch_image(&self, filename: &str) -> Result<Vec<u8>, ApiError> {
        let path = format!("/images/{}", image_basename(filename));
        let request = self.client.request(Method::GET, &path);
        read_bytes(self.client.send(request).await?).await
    }
}

#[async_trait]
impl TodoBackend for TodoApi {
    async fn list(&self) -> Result<Vec<Todo>, ApiError> {
        let request = self.client.request(Method::GET, "/todos");
        read_json(self.client.send(request).await?).await
    }

    async fn create(&self, draft: &TodoDraft) -> Result<Todo, ApiError> {
        let mut form = Form::new()
            .text("title", draft.title.clone())
            .text("description", draft.description.clone());
        if let Some(image) = &draft.image {
            form = form.part("image", image_part(image)?);
        }

        let request = self.client.request(Method::POST, "/todos").multipart(form);
        match read_json::<CreateTodoResponse>(self.client.send(request).await?).await? {
            CreateTodoResponse::Record(todo) => Ok(todo),
            CreateTodoResponse::Ack { todo_id } => {
                tracing::debug!(todo_id, "create acknowledged without record; re-listing");
                self.list()
                    .await?
                    .into_iter()
                    .find(|todo| todo.id == todo_id)
                    .ok_or_else(|| ApiError::NotFound(format!("created todo {todo_id} missing from list")))
            }
        }
    }

    async fn update(&self, id: i64, changes: &TodoUpdate) -> Result<(), ApiError> {
        let mut form = Form::new();
        if let Some(title) = &changes.title {
            form = form.text("title", title.clone());
        }
        if let Some(description) = &changes.description {
            form = form.text("description", description.clone());
        }
        if let Some(is_completed) = changes.is_completed {
            form = form.text("is_completed", is_completed.to_string());
        }
        if let Some(image) = &changes.image {
            form = form.part("image", image_part(image)?);
        }

        let request = self
            .client
            .request(Method::PUT, &format!("/todos/{id}"))
            .multipart(form);
        read_ack(self.client.send(request).await?).await
    }

    async fn update_status(&self, id: i64, is_completed: bool) -> Result<(), ApiError> {
        let request = self
            .client
            .request(Method::PUT, &format!("/todos/{id}/status"))
            .json(&TodoStatusUpdate { is_completed });
        read_ack(self.client.send(request).await?).await
    }

    async fn delete(&self, id: i64) -> Result<(), ApiError> {
        let request = self.client.request(Method::DELETE, &format!("/todos/{id}"));
        read_ack(self.client.send(request).await?).await
    }
}

fn image_part(image: &ImageUpload) -> Result<Part, ApiError> {
    Part::bytes(image.bytes.clone())
        .file_name(image.file_name.clone())
        .mime_str(&image.content_type)
        .map_err(|e| ApiError::InvalidRequest(e.to_string()))
}

fn image_basename(image_ref: &str) -> &str {
    image_ref.rsplit('/').next().unwrap_or(image_ref)
}

pub(crate) fn resolve_image_url(base_url: &str, image_ref: &str) -> Option<String> {
    let image_ref = image_ref.trim();
    if image_ref.is_empty() {
        return None;
    }
    if image_ref.starts_with("http://") || image_ref.starts_with("https://") {
        return Some(image_ref.to_owned());
    }
    let name = image_basename(image_ref);
    if name.is_empty() {
        return None;
    }
    Some(format!("{}/images/{name}", base_url.trim_end_matches('/')))
}
