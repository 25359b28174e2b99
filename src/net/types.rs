//! Shared wire-protocol DTOs for the client/backend boundary.
//!
//! DESIGN
//! ======
//! Field names mirror the backend's JSON (snake case) so serde round-trips
//! stay lossless and the session file can reuse the same `User` encoding.

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

use std::path::Path;

use serde::{Deserialize, Serialize};

/// An authenticated user as returned by the `/me` endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique user identifier assigned by the backend.
    pub id: i64,
    /// Login name.
    pub username: String,
    /// Contact email.
    pub email: String,
}

/// A persisted pairing of an access token and the profile it authenticates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub user: User,
}

/// A todo item owned by a single user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    /// Server-assigned identifier.
    pub id: i64,
    pub title: String,
    pub description: String,
    /// Completion flag toggled from the dashboard.
    pub is_completed: bool,
    /// Owner of the todo.
    pub user_id: i64,
    /// Username of the creator, denormalized by the backend.
    pub added_by: String,
    /// Stored image reference (absolute URL or backend-relative path).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Credentials for `POST /login`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LoginData {
    pub username: String,
    pub password: String,
}

/// Account fields for `POST /signup`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SignupData {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Successful `POST /login` response.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub user_id: i64,
    pub username: String,
}

fn default_token_type() -> String {
    "bearer".to_owned()
}

/// Successful `POST /signup` response.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SignupResponse {
    pub message: String,
    pub user_id: i64,
}

/// An image attached to a todo create or update request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// Read an image from disk, inferring its content type from the extension.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map_or_else(|| "image".to_owned(), |name| name.to_string_lossy().into_owned());
        let content_type = content_type_for(&file_name).to_owned();
        Ok(Self { file_name, content_type, bytes })
    }
}

/// Map a file name to one of the image MIME types the backend accepts.
///
/// Unknown extensions fall back to `application/octet-stream`; the backend
/// rejects those with a validation error.
pub(crate) fn content_type_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Fields for creating a todo (`POST /todos`, multipart).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TodoDraft {
    pub title: String,
    pub description: String,
    pub image: Option<ImageUpload>,
}

/// Partial update for `PUT /todos/{id}` (multipart). `None` fields are left untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TodoUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub is_completed: Option<bool>,
    pub image: Option<ImageUpload>,
}

impl TodoUpdate {
    /// `true` when the update carries no changes at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.is_completed.is_none() && self.image.is_none()
    }
}

/// JSON body for `PUT /todos/{id}/status`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoStatusUpdate {
    pub is_completed: bool,
}

/// `POST /todos` returns either the stored record or a bare acknowledgement.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub(crate) enum CreateTodoResponse {
    Record(Todo),
    Ack { todo_id: i64 },
}
