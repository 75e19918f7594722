//! Error types for the lazy-traveler binary

use thiserror::Error;

/// Failure of one REPL command
///
/// Wraps the error types of the library crates so command handlers can use `?`
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("{0}")]
    Core(#[from] lt_core::Error),

    #[error("{0}")]
    Api(#[from] lt_api::ApiError),

    #[error("Chat error: {0}")]
    Chat(#[from] lt_chat::ChatError),

    /// The command line could not be understood
    #[error("{0}")]
    Usage(String),
}

/// Result type alias for the binary
pub type Result<T> = std::result::Result<T, ClientError>;
