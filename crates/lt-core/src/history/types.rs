//! History wire types

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One session as listed by the history endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub first_message: String,
    pub created_at: DateTime<Utc>,
    /// `true` once the backend has listed this session
    #[serde(skip)]
    pub confirmed: bool,
}

impl SessionSummary {
    /// A session the backend has acknowledged over the socket but not yet listed
    pub fn local(
        session_id: impl Into<String>,
        first_message: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            first_message: first_message.into(),
            created_at,
            confirmed: false,
        }
    }

    /// Calendar day the session is filed under
    pub fn day(&self) -> NaiveDate {
        self.created_at.with_timezone(&Local).date_naive()
    }
}

/// One stored exchange of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRecord {
    pub message: String,
    pub response: String,
    pub created_at: DateTime<Utc>,
    pub session_id: String,
}
