//! Events emitted to the presentation layer

use lt_core::history::{ChatRecord, HistoryIndex};
use lt_core::quota::QuotaKind;

use crate::message::Recommendation;

/// Socket lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Open => write!(f, "open"),
            ConnectionState::Closed => write!(f, "closed"),
        }
    }
}

/// Renderable change produced by the session manager
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    ConnectionChanged(ConnectionState),

    /// Local echo of an outbound message
    MessageAppended { text: String },

    /// "Awaiting response" marker keyed by correlation id
    PlaceholderAdded { id: String },

    PlaceholderResolved {
        id: String,
        text: String,
        recommendations: Vec<Recommendation>,
    },

    PlaceholderFailed { id: String, reason: String },

    /// The input buffer may be cleared, the frame is on its way
    InputCleared,

    InputEnabled,

    InputDisabled,

    /// The history index after a successful refresh
    HistoryReplaced(HistoryIndex),

    /// The message view now shows a stored, read-only session
    ViewReplaced {
        session_id: String,
        records: Vec<ChatRecord>,
    },

    /// Active session identity changed; `None` means the next send starts a new one
    SessionChanged(Option<String>),

    ReauthRequired,

    QuotaExceeded(QuotaKind),

    Notice(String),
}
