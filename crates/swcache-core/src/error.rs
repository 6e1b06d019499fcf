//! Error types for swcache.
//!
//! Only a handful of these ever reach a caller of `Router::on_fetch`: network
//! failures in the fetch path are recovered by cache or offline fallbacks, and
//! background failures are discarded at the task boundary. Install, sync and
//! configuration errors do propagate.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for swcache.
#[derive(Debug, Error)]
pub enum SwError {
    // Network errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        /// Optional cause description
        cause: Option<String>,
    },

    #[error("Request timeout after {0:?}")]
    Timeout(std::time::Duration),

    // Lifecycle errors
    #[error("Precache of {url} failed: {message}")]
    InstallFailed { url: String, message: String },

    #[error("Invalid lifecycle transition from {from} to {to}")]
    InvalidState { from: String, to: String },

    // Cache store errors
    #[error("Cache store error: {message}")]
    Store { message: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for swcache operations.
pub type Result<T> = std::result::Result<T, SwError>;

impl From<std::io::Error> for SwError {
    fn from(err: std::io::Error) -> Self {
        SwError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for SwError {
    fn from(err: serde_json::Error) -> Self {
        SwError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for SwError {
    fn from(err: rusqlite::Error) -> Self {
        SwError::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<url::ParseError> for SwError {
    fn from(err: url::ParseError) -> Self {
        SwError::Validation {
            field: "url".to_string(),
            message: err.to_string(),
        }
    }
}

impl SwError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        SwError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create a network error from a message.
    pub fn network(message: impl Into<String>) -> Self {
        SwError::Network {
            message: message.into(),
            cause: None,
        }
    }

    /// Check if this error came from the network fetcher.
    ///
    /// The fetch strategies fall back to cached content for these.
    pub fn is_network(&self) -> bool {
        matches!(self, SwError::Network { .. } | SwError::Timeout(_))
    }

    /// Check if this error is fatal to the install step.
    pub fn is_install_failure(&self) -> bool {
        matches!(self, SwError::InstallFailed { .. })
    }
}
