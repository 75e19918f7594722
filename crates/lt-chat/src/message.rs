//! Chat socket frame types
//!
//! Outbound frames carry the user's text, position and session identity.
//! Inbound frames are loosely shaped JSON objects; [`ServerFrame::classify`]
//! turns them into replies, errors or notices.

use chrono::{Local, SecondsFormat};
use serde::{Deserialize, Serialize};

use lt_core::Position;

/// Message from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Empty when the server must allocate a new session
    pub session_id: String,
    pub new_session: bool,
    /// Correlation id the server may echo back
    pub client_msg_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl ChatRequest {
    /// Build a frame for `text`; `session_id` is the cached id, if any
    pub fn new(text: impl Into<String>, position: Position, session_id: Option<&str>) -> Self {
        let position = position.rounded();
        Self {
            message: text.into(),
            latitude: position.latitude,
            longitude: position.longitude,
            session_id: session_id.unwrap_or_default().to_string(),
            new_session: session_id.is_none(),
            client_msg_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Some(Local::now().to_rfc3339_opts(SecondsFormat::Secs, false)),
        }
    }
}

/// Place suggested alongside a reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub name: String,
    #[serde(default)]
    pub website: String,
}

/// Raw message from server to client
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerFrame {
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    /// Echo of the user's text on replies, greeting text otherwise
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub recommendations: Vec<Recommendation>,
    #[serde(default)]
    pub client_msg_id: Option<String>,
}

/// Classified inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    Reply {
        text: String,
        session_id: Option<String>,
        correlation_id: Option<String>,
        recommendations: Vec<Recommendation>,
    },
    Error {
        message: String,
        correlation_id: Option<String>,
    },
    /// Informational text not tied to a pending message
    Notice { text: String },
}

impl ServerFrame {
    pub fn classify(self) -> Option<InboundEvent> {
        let correlation_id = self.client_msg_id.filter(|id| !id.is_empty());

        if let Some(text) = self.response {
            return Some(InboundEvent::Reply {
                text,
                session_id: self.session_id.filter(|id| !id.is_empty()),
                correlation_id,
                recommendations: self.recommendations,
            });
        }
        if let Some(message) = self.error {
            return Some(InboundEvent::Error {
                message,
                correlation_id,
            });
        }
        self.message.map(|text| InboundEvent::Notice { text })
    }
}
