//! Error types for hn-crawl
//!
//! Fatal conditions (range resolution, opening storage, creating output files)
//! surface as [`Error`]. Per-item fetch failures are [`SourceError`]s, which the
//! worker pool retries instead of returning.

use thiserror::Error;

use crate::retry::IsRetryable;

/// Result type alias for hn-crawl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for hn-crawl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "crawl.workers")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Remote source error
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error outside of item fetching (client construction)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The run was cancelled before every id was accounted for
    #[error("crawl cancelled after persisting {persisted} of {expected} items")]
    Cancelled {
        /// Records persisted before cancellation
        persisted: u64,
        /// Ids in the range
        expected: u64,
    },

    /// The result channel closed before every id was accounted for
    #[error("crawl ended after {received} of {expected} results")]
    Incomplete {
        /// Outcomes received from workers
        received: u64,
        /// Ids in the range
        expected: u64,
    },

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a [`Error::Config`] tied to a configuration key
    pub fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),
}

/// Errors talking to the remote item source
#[derive(Debug, Error)]
pub enum SourceError {
    /// The request could not be sent or timed out
    #[error("request to {url} failed: {source}")]
    Request {
        /// Requested URL
        url: String,
        /// Underlying client error
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a rate-limit or server-error status
    #[error("{url} returned HTTP {status}")]
    Status {
        /// Requested URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// The response body could not be read
    #[error("failed to read body from {url}: {source}")]
    Body {
        /// Requested URL
        url: String,
        /// Underlying client error
        #[source]
        source: reqwest::Error,
    },

    /// The max item endpoint did not return an integer
    #[error("max item response is not an integer: {body:?}")]
    InvalidMaxItem {
        /// Raw response body
        body: String,
    },

    /// Any other failure reported by a source implementation
    #[error("{0}")]
    Other(String),
}

impl IsRetryable for SourceError {
    fn is_retryable(&self) -> bool {
        match self {
            // Timeouts, resets, refused connections: all transient from the crawler's view
            SourceError::Request { .. } => true,
            // Only 429 and 5xx become Status errors
            SourceError::Status { .. } => true,
            SourceError::Body { .. } => true,
            // A malformed upper bound will not fix itself
            SourceError::InvalidMaxItem { .. } => false,
            SourceError::Other(_) => true,
        }
    }
}
