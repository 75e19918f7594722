//! In-memory transport and history source for manager tests

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use lt_core::history::{ChatRecord, HistorySource, SessionSummary};
use lt_core::quota::{DailyQuota, QuotaKind};
use lt_core::{ClientState, MemoryStore};

use crate::error::{ChatError, Result};
use crate::event::ChatEvent;
use crate::manager::{ChatSessionManager, ManagerConfig};
use crate::message::ChatRequest;
use crate::transport::{Connection, Transport, TransportEvent};

pub(crate) const WS_URL: &str = "wss://chat.test/ws/chat/";

pub(crate) fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
}

/// Server side of one mock connection
pub(crate) struct ServerEnd {
    sent: mpsc::UnboundedReceiver<String>,
    inbound: mpsc::UnboundedSender<TransportEvent>,
}

impl ServerEnd {
    pub fn try_request(&mut self) -> Option<ChatRequest> {
        let raw = self.sent.try_recv().ok()?;
        Some(serde_json::from_str(&raw).unwrap())
    }

    pub fn take_request(&mut self) -> ChatRequest {
        self.try_request().expect("no frame was sent")
    }

    pub async fn next_request(&mut self) -> ChatRequest {
        let raw = self.sent.recv().await.expect("connection dropped");
        serde_json::from_str(&raw).unwrap()
    }

    pub fn push(&self, frame: serde_json::Value) {
        let _ = self.inbound.send(TransportEvent::Frame(frame.to_string()));
    }

    pub fn close(&self) {
        let _ = self.inbound.send(TransportEvent::Closed(None));
    }
}

#[derive(Default)]
struct MockTransportState {
    urls: Vec<String>,
    failures: usize,
    servers: VecDeque<ServerEnd>,
}

/// Transport whose connections are plain channels
#[derive(Default)]
pub(crate) struct MockTransport {
    state: Mutex<MockTransportState>,
}

impl MockTransport {
    /// Make the next `n` open attempts fail
    pub fn fail_next(&self, n: usize) {
        self.state.lock().unwrap().failures = n;
    }

    /// Open attempts so far, failed ones included
    pub fn opens(&self) -> usize {
        self.state.lock().unwrap().urls.len()
    }

    pub fn urls(&self) -> Vec<String> {
        self.state.lock().unwrap().urls.clone()
    }

    /// Server end of the oldest connection not yet taken
    pub fn take_server(&self) -> ServerEnd {
        self.state
            .lock()
            .unwrap()
            .servers
            .pop_front()
            .expect("no connection was opened")
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(&self, url: &str) -> Result<Connection> {
        let mut state = self.state.lock().unwrap();
        state.urls.push(url.to_string());
        if state.failures > 0 {
            state.failures -= 1;
            return Err(ChatError::WebSocket("connection refused".to_string()));
        }

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        state.servers.push_back(ServerEnd {
            sent: out_rx,
            inbound: in_tx,
        });
        Ok(Connection::new(out_tx, in_rx))
    }
}

enum Failure {
    Unauthorized,
    Remote,
}

/// History source serving canned listings
#[derive(Default)]
pub(crate) struct MockHistory {
    index: Mutex<Vec<SessionSummary>>,
    sessions: Mutex<HashMap<String, Vec<ChatRecord>>>,
    failure: Mutex<Option<Failure>>,
    index_calls: AtomicUsize,
}

impl MockHistory {
    pub fn set_index(&self, index: Vec<SessionSummary>) {
        *self.index.lock().unwrap() = index;
    }

    pub fn add_session(&self, session_id: &str, records: Vec<ChatRecord>) {
        self.sessions
            .lock()
            .unwrap()
            .insert(session_id.to_string(), records);
    }

    pub fn fail_with_unauthorized(&self) {
        *self.failure.lock().unwrap() = Some(Failure::Unauthorized);
    }

    pub fn fail_with_remote(&self) {
        *self.failure.lock().unwrap() = Some(Failure::Remote);
    }

    pub fn index_calls(&self) -> usize {
        self.index_calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> lt_core::Result<()> {
        match *self.failure.lock().unwrap() {
            Some(Failure::Unauthorized) => Err(lt_core::Error::Unauthorized),
            Some(Failure::Remote) => Err(lt_core::Error::Remote("503 Service Unavailable".into())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl HistorySource for MockHistory {
    async fn fetch_index(&self) -> lt_core::Result<Vec<SessionSummary>> {
        self.index_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.index.lock().unwrap().clone())
    }

    async fn fetch_session(&self, session_id: &str) -> lt_core::Result<Vec<ChatRecord>> {
        self.check()?;
        self.sessions
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .ok_or_else(|| lt_core::Error::Remote(format!("404 Not Found: {}", session_id)))
    }
}

/// A manager wired to mocks, plus handles to inspect them
pub(crate) struct Harness {
    pub manager: ChatSessionManager,
    pub transport: Arc<MockTransport>,
    pub history: Arc<MockHistory>,
    pub state: ClientState,
    pub events: mpsc::UnboundedReceiver<ChatEvent>,
    today: Arc<Mutex<NaiveDate>>,
    reconnect_delay: Duration,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_reconnect_delay(Duration::from_secs(10))
    }

    pub fn with_reconnect_delay(reconnect_delay: Duration) -> Self {
        let state = ClientState::new(Arc::new(MemoryStore::new()));
        Self::build(
            state,
            Arc::new(MockTransport::default()),
            Arc::new(MockHistory::default()),
            Arc::new(Mutex::new(day(1))),
            reconnect_delay,
        )
    }

    /// Fresh manager over the same store and mocks, as after a restart
    pub fn rebuild(self) -> Self {
        Self::build(
            self.state,
            self.transport,
            self.history,
            self.today,
            self.reconnect_delay,
        )
    }

    fn build(
        state: ClientState,
        transport: Arc<MockTransport>,
        history: Arc<MockHistory>,
        today: Arc<Mutex<NaiveDate>>,
        reconnect_delay: Duration,
    ) -> Self {
        let config = ManagerConfig {
            ws_url: WS_URL.to_string(),
            reconnect_delay,
            message_quota: DailyQuota::messages(100),
            refresh_quota: DailyQuota::refreshes(5),
        };
        let (tx, events) = mpsc::unbounded_channel();
        let clock = today.clone();
        let manager = ChatSessionManager::new(
            config,
            state.clone(),
            transport.clone(),
            history.clone(),
            tx,
        )
        .with_today(move || *clock.lock().unwrap());

        Self {
            manager,
            transport,
            history,
            state,
            events,
            today,
            reconnect_delay,
        }
    }

    pub fn sign_in(&self) {
        self.state.set_tokens("access-token", "refresh-token").unwrap();
    }

    pub fn set_today(&self, date: NaiveDate) {
        *self.today.lock().unwrap() = date;
    }

    pub fn quota_used(&self, kind: QuotaKind) -> u32 {
        let quota = DailyQuota { kind, limit: 0 };
        quota.used(self.state.store(), *self.today.lock().unwrap()).unwrap()
    }

    /// Events emitted so far
    pub fn drain(&mut self) -> Vec<ChatEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}
