//! In-memory store, used by tests and guest sessions

use std::collections::HashMap;
use std::sync::Mutex;

use super::ClientStore;
use crate::{Error, Result};

/// Non-persistent [`ClientStore`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClientStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self.values.lock().map_err(|_| Error::LockPoisoned)?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.lock().map_err(|_| Error::LockPoisoned)?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut values = self.values.lock().map_err(|_| Error::LockPoisoned)?;
        values.remove(key);
        Ok(())
    }
}
