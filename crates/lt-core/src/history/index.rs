//! Date-ordered session index and its reconciliation with the backend

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use super::SessionSummary;

/// Sessions grouped by day, newest day and newest session first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryIndex {
    days: BTreeMap<NaiveDate, Vec<SessionSummary>>,
}

/// What a [`HistoryIndex::reconcile`] call changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Sessions listed by the backend that were not in the index
    pub added: usize,
    /// Confirmed sessions the backend no longer lists
    pub removed: usize,
    /// Local entries kept because the backend does not list them yet
    pub kept_local: usize,
}

impl HistoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from backend entries, all marked confirmed
    pub fn from_server(sessions: Vec<SessionSummary>) -> Self {
        let mut index = Self::new();
        for mut summary in sessions {
            summary.confirmed = true;
            index.insert(summary);
        }
        index
    }

    pub fn len(&self) -> usize {
        self.days.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn get(&self, session_id: &str) -> Option<&SessionSummary> {
        self.days
            .values()
            .flat_map(|sessions| sessions.iter())
            .find(|s| s.session_id == session_id)
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.get(session_id).is_some()
    }

    /// Days newest first, each with its sessions newest first
    pub fn days(&self) -> impl Iterator<Item = (&NaiveDate, &[SessionSummary])> {
        self.days.iter().rev().map(|(day, sessions)| (day, sessions.as_slice()))
    }

    /// All sessions newest first
    pub fn sessions(&self) -> Vec<&SessionSummary> {
        self.days().flat_map(|(_, sessions)| sessions.iter()).collect()
    }

    /// Add an optimistic entry for a session started on this client.
    ///
    /// Returns `false` when the session is already indexed.
    pub fn record_local(&mut self, summary: SessionSummary) -> bool {
        if self.contains(&summary.session_id) {
            return false;
        }
        let mut summary = summary;
        summary.confirmed = false;
        self.insert(summary);
        true
    }

    /// Merge a fresh backend listing into the index.
    ///
    /// Backend entries replace local ones with the same id. Unconfirmed
    /// local entries absent from the listing survive; confirmed entries
    /// absent from the listing are dropped.
    pub fn reconcile(&mut self, server: Vec<SessionSummary>) -> ReconcileReport {
        let server_ids: HashSet<&str> = server.iter().map(|s| s.session_id.as_str()).collect();
        let mut report = ReconcileReport::default();

        let mut kept = Vec::new();
        for summary in self.days.values().flat_map(|sessions| sessions.iter()) {
            if server_ids.contains(summary.session_id.as_str()) {
                continue;
            }
            if summary.confirmed {
                report.removed += 1;
            } else {
                kept.push(summary.clone());
            }
        }
        report.kept_local = kept.len();
        report.added = server
            .iter()
            .filter(|s| !self.contains(&s.session_id))
            .count();

        let mut merged = Self::from_server(server);
        for summary in kept {
            merged.insert(summary);
        }
        *self = merged;

        debug!(
            "History reconciled: {} added, {} removed, {} local kept",
            report.added, report.removed, report.kept_local
        );
        report
    }

    fn insert(&mut self, summary: SessionSummary) {
        let sessions = self.days.entry(summary.day()).or_default();
        if let Some(existing) = sessions
            .iter_mut()
            .find(|s| s.session_id == summary.session_id)
        {
            *existing = summary;
        } else {
            sessions.push(summary);
        }
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, hour, 0, 0).unwrap()
    }

    fn server(id: &str, created_at: DateTime<Utc>) -> SessionSummary {
        SessionSummary {
            session_id: id.to_string(),
            first_message: format!("first message of {}", id),
            created_at,
            confirmed: false,
        }
    }

    #[test]
    fn test_groups_by_day_newest_first() {
        let index = HistoryIndex::from_server(vec![
            server("a", at(1, 12)),
            server("b", at(1, 12) + Duration::minutes(30)),
            server("c", at(5, 12)),
        ]);

        let days: Vec<_> = index.days().map(|(d, s)| (*d, s.len())).collect();
        assert_eq!(days.len(), 2);
        assert!(days[0].0 > days[1].0);

        let order: Vec<_> = index.sessions().iter().map(|s| s.session_id.clone()).collect();
        assert_eq!(order, vec!["c", "b", "a"]);
        assert!(index.sessions().iter().all(|s| s.confirmed));
    }

    #[test]
    fn test_record_local_is_idempotent() {
        let mut index = HistoryIndex::new();
        assert!(index.record_local(SessionSummary::local("s1", "hello", at(1, 12))));
        assert!(!index.record_local(SessionSummary::local("s1", "again", at(1, 13))));
        assert_eq!(index.len(), 1);
        assert_eq!(index.get("s1").unwrap().first_message, "hello");
    }

    #[test]
    fn test_reconcile_keeps_unconfirmed_local_entries() {
        let mut index = HistoryIndex::from_server(vec![server("old", at(1, 12))]);
        index.record_local(SessionSummary::local("fresh", "where to eat?", at(2, 12)));

        let report = index.reconcile(vec![server("old", at(1, 12))]);

        assert_eq!(report, ReconcileReport { added: 0, removed: 0, kept_local: 1 });
        assert!(index.contains("fresh"));
        assert!(!index.get("fresh").unwrap().confirmed);
    }

    #[test]
    fn test_reconcile_confirms_local_entry() {
        let mut index = HistoryIndex::new();
        index.record_local(SessionSummary::local("s1", "local text", at(2, 12)));

        let report = index.reconcile(vec![server("s1", at(2, 12))]);

        assert_eq!(report.kept_local, 0);
        let entry = index.get("s1").unwrap();
        assert!(entry.confirmed);
        assert_eq!(entry.first_message, "first message of s1");
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_reconcile_drops_confirmed_entries_missing_from_server() {
        let mut index = HistoryIndex::from_server(vec![
            server("a", at(1, 12)),
            server("b", at(2, 12)),
        ]);

        let report = index.reconcile(vec![server("b", at(2, 12)), server("c", at(3, 12))]);

        assert_eq!(report, ReconcileReport { added: 1, removed: 1, kept_local: 0 });
        assert!(!index.contains("a"));
        assert!(index.contains("b"));
        assert!(index.contains("c"));
    }

    #[test]
    fn test_reconcile_with_empty_listing() {
        let mut index = HistoryIndex::from_server(vec![server("a", at(1, 12))]);
        index.reconcile(Vec::new());
        assert!(index.is_empty());
    }
}
