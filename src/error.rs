//! Error types shared by the session store, REST services, and config.
//!
//! ERROR HANDLING
//! ==============
//! Services return `ApiError` unmodified so the auth context and dashboard
//! can decide at the operation boundary what becomes a user-visible notice.
//! Backend statuses are folded into the taxonomy by [`ApiError::from_status`].

#[cfg(test)]
#[path = "error_test.rs"]
mod error_test;

use serde_json::Value;

/// Errors produced by client-local session persistence.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed.
    #[error("session storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The backing file or a stored value is not valid JSON.
    #[error("session storage holds invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A stored value does not decode into the expected type.
    #[error("stored `{key}` is corrupt: {message}")]
    Corrupt { key: &'static str, message: String },

    /// A previous writer panicked while holding the storage lock.
    #[error("session storage lock poisoned")]
    Poisoned,
}

/// Errors produced by REST operations against the todo backend.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Credentials rejected or the bearer token is missing/invalid (401).
    #[error("unauthorized: {0}")]
    Auth(String),

    /// Malformed signup or todo fields (400/422).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Duplicate username or email.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Todo missing or owned by another user (403/404).
    #[error("not found: {0}")]
    NotFound(String),

    /// The request never reached the backend (connect failure, timeout).
    #[error("network error: {0}")]
    Network(String),

    /// Any other non-success status.
    #[error("server returned {status}: {message}")]
    Server { status: u16, message: String },

    /// A success response whose body did not match the expected shape.
    #[error("response decode failed: {0}")]
    Decode(String),

    /// The request could not be built (bad header value, bad multipart part).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Session persistence failed while handling the request.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ApiError {
    /// Fold a non-success status and its raw body into the error taxonomy.
    #[must_use]
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = detail_message(body).unwrap_or_else(|| default_reason(status).to_owned());
        match status {
            400 if message.to_ascii_lowercase().contains("already registered") => Self::Conflict(message),
            400 | 422 => Self::Validation(message),
            401 => Self::Auth(message),
            403 | 404 => Self::NotFound(message),
            409 => Self::Conflict(message),
            _ => Self::Server { status, message },
        }
    }

    /// Backend-provided detail suitable for a user-facing notice.
    ///
    /// Transport and client-side failures carry no backend detail.
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Auth(message)
            | Self::Validation(message)
            | Self::Conflict(message)
            | Self::NotFound(message)
            | Self::Server { message, .. } => Some(message),
            Self::Network(_) | Self::Decode(_) | Self::InvalidRequest(_) | Self::Storage(_) => None,
        }
    }

    /// Short machine-readable code for logs and CLI output.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Auth(_) => "E_AUTH",
            Self::Validation(_) => "E_VALIDATION",
            Self::Conflict(_) => "E_CONFLICT",
            Self::NotFound(_) => "E_NOT_FOUND",
            Self::Network(_) => "E_NETWORK",
            Self::Server { .. } => "E_SERVER",
            Self::Decode(_) => "E_DECODE",
            Self::InvalidRequest(_) => "E_INVALID_REQUEST",
            Self::Storage(_) => "E_STORAGE",
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::Decode(error.to_string())
        } else if error.is_builder() {
            Self::InvalidRequest(error.to_string())
        } else {
            Self::Network(error.to_string())
        }
    }
}

/// Pull the `detail` message out of a backend error body.
///
/// The backend sends either `{"detail": "text"}` or, for schema validation,
/// `{"detail": [{"msg": "..."}, ...]}`. Anything else, such as a proxy's HTML
/// error page, yields `None` so callers fall back to a fixed reason.
pub(crate) fn detail_message(body: &str) -> Option<String> {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return None;
    };
    match value.get("detail")? {
        Value::String(text) => Some(text.clone()),
        Value::Array(items) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            (!messages.is_empty()).then(|| messages.join("; "))
        }
        _ => None,
    }
}

fn default_reason(status: u16) -> &'static str {
    match status {
        400 => "bad request",
        401 => "could not validate credentials",
        403 => "forbidden",
        404 => "not found",
        409 => "conflict",
        422 => "unprocessable entity",
        500..=599 => "backend failure",
        _ => "unexpected status",
    }
}

/// Errors produced while reading client configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The API base URL is not an `http://` or `https://` URL.
    #[error("invalid API URL `{0}`: expected http:// or https://")]
    InvalidUrl(String),

    /// A numeric setting could not be parsed.
    #[error("invalid value `{value}` for {var}: expected a positive integer")]
    InvalidNumber { var: &'static str, value: String },
}
