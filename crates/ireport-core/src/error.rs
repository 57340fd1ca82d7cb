//! Error types for ireport-core

use thiserror::Error;

/// Result type alias using ireport-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in ireport-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Cloud backend rejected a request
    #[error("Cloud API error: {0}")]
    Cloud(String),

    /// Media/object storage error
    #[error("Storage error: {0}")]
    Storage(String),
}
