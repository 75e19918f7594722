//! Error types for lt-core

use thiserror::Error;

/// Main error type for lt-core
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The backend rejected the stored credentials (401/403)
    #[error("Reauthentication required")]
    Unauthorized,

    #[error("Remote request failed: {0}")]
    Remote(String),

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("{0}")]
    Other(String),
}

/// Result type alias for lt-core
pub type Result<T> = std::result::Result<T, Error>;
