//! lt-api: REST client for the lazy-traveler backend
//!
//! Account management (login, signup, logout, tags, password, deletion,
//! my-page) and the chat history endpoints. All authenticated calls carry
//! the access token as a bearer credential.

pub mod client;
pub mod error;
pub mod models;

pub use client::ApiClient;
pub use error::{ApiError, Result};
pub use models::{AVAILABLE_TAGS, PasswordChange, Profile, SignupRequest, Tokens, validate_tags};
