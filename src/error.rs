//! Error types for canvas-submission-dl

use std::time::Duration;
use thiserror::Error;

/// Result type alias for canvas-submission-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for canvas-submission-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The environment variable or key that caused the error
        key: Option<String>,
    },

    /// Network error (connection, timeout, body read)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid URL
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// API endpoint returned a non-success status
    #[error("API request to {url} failed with status {status}")]
    Api {
        /// The HTTP status code returned
        status: u16,
        /// The URL that was requested
        url: String,
    },

    /// Server asked us to slow down (HTTP 429)
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// The wait the server requested via Retry-After (or our default)
        retry_after: Duration,
    },

    /// File download returned a non-success status
    #[error("download of {url} failed with status {status}")]
    Download {
        /// The HTTP status code returned
        status: u16,
        /// The file URL that was requested
        url: String,
    },
}

impl Error {
    /// The HTTP status code observed for this error, if any
    ///
    /// Used when recording a failure to the failure log, which wants the
    /// last status code seen for the request.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } | Error::Download { status, .. } => Some(*status),
            Error::RateLimited { .. } => Some(429),
            Error::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
