//! Advisory per-day counters for messages and refresh actions
//!
//! Counters live in the client store next to the date they were last
//! bumped; a new calendar date resets them. This is cosmetic rate limiting,
//! the backend stays authoritative.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::storage::ClientStore;
use crate::Result;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Which daily cap a counter tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaKind {
    Messages,
    Refreshes,
}

impl QuotaKind {
    fn keys(self) -> (&'static str, &'static str) {
        match self {
            QuotaKind::Messages => ("message_count", "message_count_date"),
            QuotaKind::Refreshes => ("refresh_count", "refresh_count_date"),
        }
    }
}

impl std::fmt::Display for QuotaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuotaKind::Messages => write!(f, "messages"),
            QuotaKind::Refreshes => write!(f, "refreshes"),
        }
    }
}

/// A persisted daily cap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyQuota {
    pub kind: QuotaKind,
    pub limit: u32,
}

impl DailyQuota {
    pub fn messages(limit: u32) -> Self {
        Self {
            kind: QuotaKind::Messages,
            limit,
        }
    }

    pub fn refreshes(limit: u32) -> Self {
        Self {
            kind: QuotaKind::Refreshes,
            limit,
        }
    }

    /// Count already used on `today`
    pub fn used(&self, store: &dyn ClientStore, today: NaiveDate) -> Result<u32> {
        let (count_key, date_key) = self.kind.keys();

        let stored_date = store
            .get(date_key)?
            .and_then(|d| NaiveDate::parse_from_str(&d, DATE_FORMAT).ok());
        if stored_date != Some(today) {
            return Ok(0);
        }

        let count = store
            .get(count_key)?
            .and_then(|c| c.parse::<u32>().ok())
            .unwrap_or(0);
        Ok(count)
    }

    pub fn remaining(&self, store: &dyn ClientStore, today: NaiveDate) -> Result<u32> {
        Ok(self.limit.saturating_sub(self.used(store, today)?))
    }

    /// Take one unit of today's allowance; `false` when the cap is reached
    pub fn try_consume(&self, store: &dyn ClientStore, today: NaiveDate) -> Result<bool> {
        let used = self.used(store, today)?;
        if used >= self.limit {
            warn!("Daily {} limit reached ({}/{})", self.kind, used, self.limit);
            return Ok(false);
        }

        let (count_key, date_key) = self.kind.keys();
        store.set(date_key, &today.format(DATE_FORMAT).to_string())?;
        store.set(count_key, &(used + 1).to_string())?;
        debug!("Daily {} used: {}/{}", self.kind, used + 1, self.limit);
        Ok(true)
    }
}
