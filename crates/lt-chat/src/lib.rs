//! lt-chat: chat session synchronization for the lazy-traveler client
//!
//! Owns the chat socket lifecycle, the server-assigned session identity,
//! matching of replies to the messages that caused them, reconnects and
//! reconciliation of the history index.

pub mod driver;
pub mod error;
pub mod event;
pub mod manager;
pub mod message;
mod pending;
pub mod transport;

#[cfg(test)]
mod testing;

pub use driver::{ChatHandle, Command};
pub use error::{ChatError, Result};
pub use event::{ChatEvent, ConnectionState};
pub use manager::{ChatSessionManager, ManagerConfig, RejectReason, SendOutcome};
pub use message::{ChatRequest, InboundEvent, Recommendation, ServerFrame};
pub use transport::{Connection, Transport, TransportEvent, WsTransport, chat_url};
