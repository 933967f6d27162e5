//! Common error types for karat

use thiserror::Error;

/// Common result type for karat operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the karat services
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Progress phase symbol outside the canonical table
    #[error("Unknown progress phase: {0}")]
    UnknownPhase(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
