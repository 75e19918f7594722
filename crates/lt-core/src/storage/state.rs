//! Typed view over the client store keys

use chrono::NaiveDate;
use std::sync::Arc;
use tracing::debug;

use super::ClientStore;
use crate::quota::DailyQuota;
use crate::Result;

const ACCESS_TOKEN: &str = "access_token";
const REFRESH_TOKEN: &str = "refresh_token";
const SESSION_ID: &str = "session_id";
const ONBOARDING_HINT_SEEN: &str = "onboarding_hint_seen";

/// Shared handle to the persisted client state
#[derive(Clone)]
pub struct ClientState {
    store: Arc<dyn ClientStore>,
}

impl ClientState {
    pub fn new(store: Arc<dyn ClientStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &dyn ClientStore {
        self.store.as_ref()
    }

    pub fn access_token(&self) -> Result<Option<String>> {
        Ok(self.store.get(ACCESS_TOKEN)?.filter(|t| !t.is_empty()))
    }

    pub fn refresh_token(&self) -> Result<Option<String>> {
        Ok(self.store.get(REFRESH_TOKEN)?.filter(|t| !t.is_empty()))
    }

    pub fn set_tokens(&self, access: &str, refresh: &str) -> Result<()> {
        self.store.set(ACCESS_TOKEN, access)?;
        self.store.set(REFRESH_TOKEN, refresh)?;
        debug!("Stored new credentials");
        Ok(())
    }

    /// Forget both tokens (logout / account deletion)
    pub fn clear_credentials(&self) -> Result<()> {
        self.store.remove(ACCESS_TOKEN)?;
        self.store.remove(REFRESH_TOKEN)?;
        Ok(())
    }

    /// Cached chat session id; an empty value counts as absent
    pub fn session_id(&self) -> Result<Option<String>> {
        Ok(self.store.get(SESSION_ID)?.filter(|s| !s.is_empty()))
    }

    pub fn set_session_id(&self, session_id: &str) -> Result<()> {
        self.store.set(SESSION_ID, session_id)
    }

    pub fn clear_session_id(&self) -> Result<()> {
        self.store.remove(SESSION_ID)
    }

    pub fn onboarding_hint_seen(&self) -> Result<bool> {
        Ok(self.store.get(ONBOARDING_HINT_SEEN)?.as_deref() == Some("true"))
    }

    pub fn mark_onboarding_hint_seen(&self) -> Result<()> {
        self.store.set(ONBOARDING_HINT_SEEN, "true")
    }

    pub fn try_consume(&self, quota: &DailyQuota, today: NaiveDate) -> Result<bool> {
        quota.try_consume(self.store(), today)
    }

    pub fn remaining(&self, quota: &DailyQuota, today: NaiveDate) -> Result<u32> {
        quota.remaining(self.store(), today)
    }
}

impl std::fmt::Debug for ClientState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientState").finish_non_exhaustive()
    }
}
