//! Client configuration parsed from environment variables.

use std::path::PathBuf;

use crate::error::ConfigError;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8080";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const SESSION_DIR_NAME: &str = "todo-client";
pub const SESSION_FILE_NAME: &str = "session.json";
pub const FALLBACK_SESSION_FILE: &str = ".todo-session.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Backend base URL without a trailing slash.
    pub api_url: String,
    /// File backing the persisted session.
    pub session_file: PathBuf,
    pub timeouts: Timeouts,
}

impl ClientConfig {
    /// Config with defaults for everything except the backend URL.
    ///
    /// # Errors
    ///
    /// Returns an error if `api_url` is not an http(s) URL.
    pub fn new(api_url: &str, session_file: PathBuf) -> Result<Self, ConfigError> {
        Ok(Self { api_url: normalize_api_url(api_url)?, session_file, timeouts: Timeouts::default() })
    }

    /// Build typed client config from environment variables.
    ///
    /// Optional:
    /// - `TODO_API_URL`: default `http://127.0.0.1:8080`
    /// - `TODO_SESSION_FILE`: default under `$XDG_CONFIG_HOME` or `$HOME/.config`
    /// - `TODO_REQUEST_TIMEOUT_SECS`: default 30
    /// - `TODO_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is not http(s) or a timeout is not a
    /// positive integer.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_url = normalize_api_url(&env_or("TODO_API_URL", DEFAULT_API_URL))?;
        let session_file = match std::env::var("TODO_SESSION_FILE") {
            Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
            _ => default_session_file(
                std::env::var("XDG_CONFIG_HOME").unwrap_or_default().as_str(),
                std::env::var("HOME").unwrap_or_default().as_str(),
            ),
        };
        let timeouts = Timeouts {
            request_secs: env_parse_secs("TODO_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?,
            connect_secs: env_parse_secs("TODO_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)?,
        };

        Ok(Self { api_url, session_file, timeouts })
    }

    /// Replace the backend URL, keeping everything else.
    ///
    /// # Errors
    ///
    /// Returns an error if `api_url` is not an http(s) URL.
    pub fn with_api_url(self, api_url: &str) -> Result<Self, ConfigError> {
        Ok(Self { api_url: normalize_api_url(api_url)?, ..self })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn env_parse_secs(key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => parse_secs(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_secs(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(secs),
        _ => Err(ConfigError::InvalidNumber { var: key, value: raw.to_owned() }),
    }
}

pub(crate) fn normalize_api_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let host = trimmed
        .strip_prefix("http://")
        .or_else(|| trimmed.strip_prefix("https://"));
    match host {
        Some(rest) if !rest.is_empty() => Ok(trimmed.to_owned()),
        _ => Err(ConfigError::InvalidUrl(raw.to_owned())),
    }
}

pub(crate) fn default_session_file(xdg_config_home: &str, home: &str) -> PathBuf {
    if !xdg_config_home.is_empty() {
        return PathBuf::from(xdg_config_home).join(SESSION_DIR_NAME).join(SESSION_FILE_NAME);
    }
    if !home.is_empty() {
        return PathBuf::from(home).join(".config").join(SESSION_DIR_NAME).join(SESSION_FILE_NAME);
    }
    PathBuf::from(FALLBACK_SESSION_FILE)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
