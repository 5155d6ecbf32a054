use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error codes shared by every REST-facing component.
///
/// Transport failures and HTTP statuses are both folded into this taxonomy so
/// callers only ever branch on one enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Network,
    Timeout,
    Unauthorized,
    Forbidden,
    NotFound,
    Validation,
    Server,
    Cancelled,
    Unknown,
}

impl ErrorCode {
    /// Map an HTTP status code to an error code
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => ErrorCode::Unauthorized,
            403 => ErrorCode::Forbidden,
            404 => ErrorCode::NotFound,
            400 | 409 | 422 => ErrorCode::Validation,
            408 | 504 => ErrorCode::Timeout,
            s if s >= 500 => ErrorCode::Server,
            _ => ErrorCode::Unknown,
        }
    }

    /// Default message shown when the server did not provide one
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::Network => "Unable to reach the server. Check your connection.",
            ErrorCode::Timeout => "The server took too long to respond.",
            ErrorCode::Unauthorized => "You need to sign in again.",
            ErrorCode::Forbidden => "You do not have permission to do this.",
            ErrorCode::NotFound => "The requested resource was not found.",
            ErrorCode::Validation => "The submitted data is invalid.",
            ErrorCode::Server => "The server encountered an error.",
            ErrorCode::Cancelled => "The request was cancelled.",
            ErrorCode::Unknown => "An unexpected error occurred.",
        }
    }

    /// Whether retrying the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::Network | ErrorCode::Timeout | ErrorCode::Server
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCode::Network => "network",
            ErrorCode::Timeout => "timeout",
            ErrorCode::Unauthorized => "unauthorized",
            ErrorCode::Forbidden => "forbidden",
            ErrorCode::NotFound => "not_found",
            ErrorCode::Validation => "validation",
            ErrorCode::Server => "server",
            ErrorCode::Cancelled => "cancelled",
            ErrorCode::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Normalized error produced by the REST client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    /// Error code for programmatic handling
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// HTTP status, when the failure came from a response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ApiError {
    /// Create an error with an explicit code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status: None,
        }
    }

    /// Build an error from a non-success response.
    ///
    /// The message is taken from a JSON `detail`, `message` or `error` string
    /// field when the body has one, otherwise the code's default message is
    /// used.
    pub fn from_status(status: u16, body: &str) -> Self {
        let code = ErrorCode::from_status(status);
        let message = extract_message(body).unwrap_or_else(|| code.default_message().to_string());

        Self {
            code,
            message,
            status: Some(status),
        }
    }

    /// Build an error from a transport failure (no response received)
    pub fn transport(err: impl fmt::Display, timed_out: bool) -> Self {
        let code = if timed_out {
            ErrorCode::Timeout
        } else {
            ErrorCode::Network
        };
        Self::new(code, format!("{}: {}", code.default_message(), err))
    }

    /// Request exceeded the configured timeout
    pub fn timeout(after: Duration) -> Self {
        Self::new(
            ErrorCode::Timeout,
            format!("{} ({:?})", ErrorCode::Timeout.default_message(), after),
        )
    }

    /// Request was cancelled before completing
    pub fn cancelled() -> Self {
        Self::new(ErrorCode::Cancelled, ErrorCode::Cancelled.default_message())
    }

    /// Response body could not be decoded
    pub fn decode(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::Unknown, format!("Invalid response from server: {}", err))
    }

    /// The single string handed to UI-facing state (e.g. `AuthStore::mark_error`)
    pub fn user_message(&self) -> String {
        if self.message.is_empty() {
            self.code.default_message().to_string()
        } else {
            self.message.clone()
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.code == ErrorCode::Unauthorized
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return ApiError::from_status(status.as_u16(), "");
        }
        if err.is_decode() {
            return ApiError::decode(err);
        }
        ApiError::transport(&err, err.is_timeout())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_cancelled() {
            ApiError::cancelled()
        } else {
            ApiError::new(ErrorCode::Unknown, format!("Request task failed: {}", err))
        }
    }
}

fn extract_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["detail", "message", "error"]
        .iter()
        .filter_map(|field| value.get(*field))
        .find_map(|v| v.as_str().map(str::to_string))
        .filter(|m| !m.trim().is_empty())
}

/// Errors raised by the store primitive itself
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store behind a weak handle has been dropped
    #[error("Store '{name}' is no longer alive")]
    Detached { name: String },
}

/// Errors raised by storage backends
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Backend refused the write because it is full
    #[error("Storage quota exceeded while writing '{key}'")]
    QuotaExceeded { key: String },

    /// Backend is not accessible (blocked, read-only, private mode)
    #[error("Storage unavailable: {reason}")]
    Unavailable { reason: String },

    /// I/O failure in a file-backed store
    #[error("Storage I/O failed: {0}")]
    Io(String),

    /// Stored document could not be (de)serialized
    #[error("Storage serialization failed: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Errors raised while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration at {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration at {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write configuration at {path}: {reason}")]
    Write { path: String, reason: String },
}

pub type StoreResult<T> = Result<T, StoreError>;
pub type StorageResult<T> = Result<T, StorageError>;
pub type ApiResult<T> = Result<T, ApiError>;

/// Helper functions for creating common errors
pub fn storage_unavailable(reason: impl fmt::Display) -> StorageError {
    StorageError::Unavailable {
        reason: reason.to_string(),
    }
}

pub fn quota_exceeded(key: &str) -> StorageError {
    StorageError::QuotaExceeded {
        key: key.to_string(),
    }
}

pub fn store_detached(name: &str) -> StoreError {
    StoreError::Detached {
        name: name.to_string(),
    }
}
