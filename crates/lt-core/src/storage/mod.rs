//! Durable client-side key/value state
//!
//! Holds the access/refresh tokens, the current chat session id, daily
//! counters and one-time UI flags across restarts.

mod memory;
mod sqlite;
mod state;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use state::ClientState;

use crate::Result;

/// String key/value storage backing [`ClientState`]
pub trait ClientStore: Send + Sync {
    /// Read a value, `None` when the key was never written or was removed
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Insert or overwrite a value
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key; removing a missing key is not an error
    fn remove(&self, key: &str) -> Result<()>;
}
