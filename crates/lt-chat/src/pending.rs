//! Outbound messages still waiting for their reply

/// One rendered placeholder
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Pending {
    /// Correlation id sent as `client_msg_id`
    pub id: String,
    pub text: String,
    /// Sent without a session id, so its reply names the new session
    pub new_session: bool,
}

/// Placeholders in send order
#[derive(Debug, Default)]
pub(crate) struct PendingReplies {
    entries: Vec<Pending>,
}

impl PendingReplies {
    pub fn push(&mut self, pending: Pending) {
        self.entries.push(pending);
    }

    /// Take the placeholder a reply belongs to.
    ///
    /// An echoed correlation id selects exactly that entry (or nothing when
    /// it is unknown). Without one, the newest entry is taken.
    pub fn resolve(&mut self, correlation_id: Option<&str>) -> Option<Pending> {
        match correlation_id {
            Some(id) => {
                let index = self.entries.iter().position(|p| p.id == id)?;
                Some(self.entries.remove(index))
            }
            None => self.entries.pop(),
        }
    }

    pub fn drain(&mut self) -> Vec<Pending> {
        std::mem::take(&mut self.entries)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
