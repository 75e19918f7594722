//! Error types for lt-api

use thiserror::Error;

/// lt-api error type
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// 401/403 from the backend; the user has to sign in again
    #[error("Reauthentication required")]
    Unauthorized,

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Not signed in")]
    NotSignedIn,
}

impl From<ApiError> for lt_core::Error {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized | ApiError::NotSignedIn => lt_core::Error::Unauthorized,
            other => lt_core::Error::Remote(other.to_string()),
        }
    }
}

/// Result type alias for lt-api
pub type Result<T> = std::result::Result<T, ApiError>;
