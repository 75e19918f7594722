//! Error types for lt-chat

use thiserror::Error;

/// Chat error type
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid chat URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Core error: {0}")]
    Core(#[from] lt_core::Error),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Channel send error: {0}")]
    ChannelSend(String),
}

/// Result type alias for lt-chat
pub type Result<T> = std::result::Result<T, ChatError>;
