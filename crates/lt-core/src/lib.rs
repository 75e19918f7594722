//! lt-core: Lazy Traveler Core Library
//!
//! Shared pieces of the lazy-traveler client: configuration, durable client
//! state, the advisory daily quota and the chat history index.

pub mod config;
pub mod error;
pub mod history;
pub mod position;
pub mod quota;
pub mod storage;

pub use config::{ApiConfig, ChatConfig, Config, LimitsConfig, StorageConfig};
pub use error::{Error, Result};
pub use history::{ChatRecord, HistoryIndex, HistorySource, ReconcileReport, SessionSummary};
pub use position::Position;
pub use quota::{DailyQuota, QuotaKind};
pub use storage::{ClientState, ClientStore, MemoryStore, SqliteStore};
