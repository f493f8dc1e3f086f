//! Error types for jobsight.

use thiserror::Error;

/// Result type alias using jobsight's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for jobsight operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Crawl source could not produce any records
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    /// Classifier call failed or returned an unusable response
    #[error("Classifier error: {0}")]
    Classifier(String),

    /// Tabular sink rejected a write
    #[error("Sink error: {0}")]
    Sink(String),

    /// Operation conflicts with one already in progress
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

impl Error {
    /// Whether the failure is worth retrying with the same input.
    ///
    /// Input, configuration and conflict errors will fail the same way again.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Database(_)
                | Error::Sink(_)
                | Error::Request(_)
                | Error::Io(_)
                | Error::Classifier(_)
                | Error::SourceUnavailable(_)
        )
    }
}
