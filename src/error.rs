/// Error types for the chat client.
/// Maps backend responses and local failures onto one taxonomy.

use reqwest::StatusCode;
use serde::Deserialize;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("State error: {0}")]
    StateError(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Database error: {0}")]
    DbError(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// Error body shape used by the backend (`{"detail": ...}`)
#[derive(Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

impl ClientError {
    /// Build an error from a non-success HTTP status and the raw response body
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let detail = extract_detail(body).unwrap_or_else(|| status.to_string());

        match status {
            StatusCode::UNAUTHORIZED => ClientError::AuthError(detail),
            StatusCode::NOT_FOUND => ClientError::NotFound(detail),
            StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
                ClientError::ValidationError(detail)
            }
            _ => ClientError::ServerError(detail),
        }
    }

    /// True for expired or invalid credentials
    pub fn is_auth(&self) -> bool {
        matches!(self, ClientError::AuthError(_))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::ServerError(format!("Invalid response body: {}", err))
        } else {
            ClientError::NetworkError(err.to_string())
        }
    }
}

/// Pull a readable message out of a `{"detail": ...}` body.
///
/// Validation failures carry a list of `{loc, msg}` objects; only the
/// messages are kept.
fn extract_detail(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;

    match parsed.detail {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Array(items) => {
            let messages: Vec<String> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
                .map(|m| m.to_string())
                .collect();
            if messages.is_empty() {
                None
            } else {
                Some(messages.join("; "))
            }
        }
        _ => None,
    }
}
