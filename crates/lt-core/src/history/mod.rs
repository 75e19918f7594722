//! Chat history index
//!
//! Sessions listed by the backend, grouped by the local calendar date of
//! their first message, plus optimistic entries for sessions the client has
//! started but the backend has not listed yet.

mod index;
mod types;

pub use index::{HistoryIndex, ReconcileReport};
pub use types::{ChatRecord, SessionSummary};

use async_trait::async_trait;

use crate::Result;

/// Where the history index and per-session logs come from
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// All sessions of the signed-in user, newest first
    async fn fetch_index(&self) -> Result<Vec<SessionSummary>>;

    /// Every exchange of one session, oldest first
    async fn fetch_session(&self, session_id: &str) -> Result<Vec<ChatRecord>>;
}
