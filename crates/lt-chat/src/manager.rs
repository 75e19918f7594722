//! Chat session manager
//!
//! Single owner of the chat socket, the server-assigned session id, the
//! placeholders awaiting replies and the history index. Every input (user
//! intent, inbound frame, close, reconnect deadline) goes through one of
//! the named handlers below, and every visible change leaves as a
//! [`ChatEvent`].

use chrono::{Local, NaiveDate, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use lt_core::config::MAX_RECONNECT_DELAY_SECS;
use lt_core::history::{HistoryIndex, HistorySource, SessionSummary};
use lt_core::quota::DailyQuota;
use lt_core::{ClientState, Config, Position};

use crate::error::ChatError;
use crate::event::{ChatEvent, ConnectionState};
use crate::message::{ChatRequest, InboundEvent, Recommendation, ServerFrame};
use crate::pending::{Pending, PendingReplies};
use crate::transport::{Connection, Transport, TransportEvent, chat_url};

/// Tunables of the session manager
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Chat endpoint without credentials
    pub ws_url: String,
    /// Fixed wait before each reconnect attempt
    pub reconnect_delay: Duration,
    pub message_quota: DailyQuota,
    pub refresh_quota: DailyQuota,
}

impl ManagerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            ws_url: config.chat.ws_url.clone(),
            reconnect_delay: config.chat.reconnect_delay(),
            message_quota: DailyQuota::messages(config.limits.daily_messages),
            refresh_quota: DailyQuota::refreshes(config.limits.daily_refreshes),
        }
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Why a send produced no frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    EmptyMessage,
    NotConnected,
    ReadOnly,
    QuotaExceeded,
    Encoding,
}

/// Result of [`ChatSessionManager::send_message`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Sent {
        correlation_id: String,
        new_session: bool,
    },
    /// The placeholder was rendered but the socket refused the frame
    Failed { correlation_id: String },
    Rejected(RejectReason),
}

type Today = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

/// Chat session state machine
pub struct ChatSessionManager {
    config: ManagerConfig,
    state: ClientState,
    transport: Arc<dyn Transport>,
    history_source: Arc<dyn HistorySource>,
    events: mpsc::UnboundedSender<ChatEvent>,
    today: Today,

    connection_state: ConnectionState,
    connection: Option<Connection>,
    session_id: Option<String>,
    pending: PendingReplies,
    history: HistoryIndex,
    read_only: bool,
    input_enabled: bool,
    reconnect_at: Option<Instant>,
}

impl ChatSessionManager {
    /// Create a manager in the `Closed` state, picking up a cached session id
    pub fn new(
        config: ManagerConfig,
        state: ClientState,
        transport: Arc<dyn Transport>,
        history_source: Arc<dyn HistorySource>,
        events: mpsc::UnboundedSender<ChatEvent>,
    ) -> Self {
        let session_id = state.session_id().unwrap_or_else(|e| {
            warn!("Could not read cached session id: {}", e);
            None
        });
        if let Some(id) = &session_id {
            debug!("Resuming cached chat session: {}", id);
        }

        Self {
            config,
            state,
            transport,
            history_source,
            events,
            today: Arc::new(|| Local::now().date_naive()),
            connection_state: ConnectionState::Closed,
            connection: None,
            session_id,
            pending: PendingReplies::default(),
            history: HistoryIndex::new(),
            read_only: false,
            input_enabled: false,
            reconnect_at: None,
        }
    }

    /// Replace the calendar used for the daily quotas
    pub fn with_today(mut self, today: impl Fn() -> NaiveDate + Send + Sync + 'static) -> Self {
        self.today = Arc::new(today);
        self
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection_state
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn is_input_enabled(&self) -> bool {
        self.input_enabled
    }

    pub fn history(&self) -> &HistoryIndex {
        &self.history
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// When the scheduled reconnect fires, if one is scheduled
    pub fn reconnect_deadline(&self) -> Option<Instant> {
        self.reconnect_at
    }

    // ---- connection lifecycle ----

    /// Open the chat socket unless one is already open or opening
    pub async fn connect(&mut self) {
        if self.connection_state != ConnectionState::Closed {
            debug!("Connect ignored while {}", self.connection_state);
            return;
        }
        // A manual connect takes the place of a scheduled one
        self.reconnect_at = None;
        self.set_state(ConnectionState::Connecting);

        let token = self.state.access_token().unwrap_or_else(|e| {
            warn!("Could not read access token, connecting as guest: {}", e);
            None
        });
        let url = match chat_url(&self.config.ws_url, token.as_deref()) {
            Ok(url) => url,
            Err(e) => {
                error!("Invalid chat URL {}: {}", self.config.ws_url, e);
                self.handle_open_failed();
                return;
            }
        };

        debug!(
            "Opening chat socket ({})",
            if token.is_some() { "signed in" } else { "guest" }
        );
        match self.transport.open(&url).await {
            Ok(connection) => {
                self.connection = Some(connection);
                self.set_state(ConnectionState::Open);
            }
            Err(e) => {
                warn!("Chat connection failed: {}", e);
                self.handle_open_failed();
            }
        }
    }

    /// Drop the current socket and open a new one with the current credentials
    pub async fn reconnect(&mut self) {
        if self.connection.take().is_some() {
            self.fail_pending("connection reset");
        }
        self.set_state(ConnectionState::Closed);
        self.connect().await;
    }

    pub fn handle_open_failed(&mut self) {
        self.connection = None;
        self.set_state(ConnectionState::Closed);
        self.schedule_reconnect();
    }

    /// The socket ended, by the server or by a failed write
    pub fn handle_closed(&mut self, reason: Option<String>) {
        if self.connection.take().is_none() && self.connection_state == ConnectionState::Closed {
            return;
        }
        info!(
            "Chat connection closed: {}",
            reason.as_deref().unwrap_or("no reason given")
        );
        self.fail_pending("connection lost");
        self.set_state(ConnectionState::Closed);
        self.schedule_reconnect();
    }

    fn schedule_reconnect(&mut self) {
        let limit = Duration::from_secs(MAX_RECONNECT_DELAY_SECS);
        let delay = if self.config.reconnect_delay > limit {
            warn!(
                "Reconnect delay {:?} exceeds {:?}, using the limit",
                self.config.reconnect_delay, limit
            );
            limit
        } else {
            self.config.reconnect_delay
        };
        self.reconnect_at = Some(Instant::now() + delay);
        info!("Reconnecting in {:?}", delay);
    }

    /// Fire the scheduled reconnect if its deadline has passed
    pub async fn poll_reconnect(&mut self) {
        match self.reconnect_at {
            Some(at) if Instant::now() >= at => {
                self.reconnect_at = None;
                self.connect().await;
            }
            _ => {}
        }
    }

    /// Next event of the open connection; never resolves while there is none
    pub(crate) async fn next_transport_event(&mut self) -> TransportEvent {
        match self.connection.as_mut() {
            Some(connection) => connection
                .recv()
                .await
                .unwrap_or(TransportEvent::Closed(None)),
            None => std::future::pending().await,
        }
    }

    pub async fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Frame(raw) => self.handle_frame(&raw).await,
            TransportEvent::Closed(reason) => self.handle_closed(reason),
        }
    }

    // ---- outbound ----

    /// Send `text` from `position` on the current session
    pub fn send_message(&mut self, text: &str, position: Position) -> SendOutcome {
        let text = text.trim();
        if text.is_empty() {
            return SendOutcome::Rejected(RejectReason::EmptyMessage);
        }
        if self.connection_state != ConnectionState::Open || self.connection.is_none() {
            debug!("Send rejected while {}", self.connection_state);
            return SendOutcome::Rejected(RejectReason::NotConnected);
        }
        if self.read_only {
            debug!("Send rejected on a read-only session view");
            return SendOutcome::Rejected(RejectReason::ReadOnly);
        }

        let request = ChatRequest::new(text, position, self.session_id.as_deref());
        let frame = match serde_json::to_string(&request) {
            Ok(frame) => frame,
            Err(e) => {
                error!("Failed to encode chat frame: {}", e);
                return SendOutcome::Rejected(RejectReason::Encoding);
            }
        };

        if !self.consume_quota(self.config.message_quota) {
            return SendOutcome::Rejected(RejectReason::QuotaExceeded);
        }

        let correlation_id = request.client_msg_id;
        let new_session = request.new_session;
        self.emit(ChatEvent::MessageAppended {
            text: text.to_string(),
        });
        self.emit(ChatEvent::PlaceholderAdded {
            id: correlation_id.clone(),
        });
        self.pending.push(Pending {
            id: correlation_id.clone(),
            text: text.to_string(),
            new_session,
        });

        let sent = match &self.connection {
            Some(connection) => connection.send(frame),
            None => Err(ChatError::ConnectionClosed),
        };
        match sent {
            Ok(()) => {
                debug!(
                    "Sent chat frame {} (new session: {})",
                    correlation_id, new_session
                );
                self.emit(ChatEvent::InputCleared);
                SendOutcome::Sent {
                    correlation_id,
                    new_session,
                }
            }
            Err(e) => {
                warn!("Chat frame not sent: {}", e);
                self.handle_closed(Some(e.to_string()));
                SendOutcome::Failed { correlation_id }
            }
        }
    }

    // ---- inbound ----

    /// Apply one raw inbound frame
    pub async fn handle_frame(&mut self, raw: &str) {
        let frame: ServerFrame = match serde_json::from_str(raw) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Dropping malformed chat frame: {}", e);
                return;
            }
        };

        match frame.classify() {
            Some(InboundEvent::Reply {
                text,
                session_id,
                correlation_id,
                recommendations,
            }) => {
                self.on_reply(text, session_id, correlation_id, recommendations)
                    .await
            }
            Some(InboundEvent::Error {
                message,
                correlation_id,
            }) => self.on_server_error(message, correlation_id),
            Some(InboundEvent::Notice { text }) => {
                debug!("Chat notice: {}", text);
                self.emit(ChatEvent::Notice(text));
            }
            None => debug!("Ignoring chat frame without content"),
        }
    }

    async fn on_reply(
        &mut self,
        text: String,
        session_id: Option<String>,
        correlation_id: Option<String>,
        recommendations: Vec<Recommendation>,
    ) {
        let pending = self.pending.resolve(correlation_id.as_deref());
        match &pending {
            Some(p) => self.emit(ChatEvent::PlaceholderResolved {
                id: p.id.clone(),
                text,
                recommendations,
            }),
            None => debug!("Reply without a pending placeholder dropped"),
        }

        // An echoed id nobody is waiting for belongs to a session already left
        if pending.is_none() && correlation_id.is_some() {
            if let Some(id) = session_id {
                debug!("Ignoring session {} from a stale reply", id);
            }
            return;
        }

        if let Some(id) = session_id {
            self.adopt_session(id, pending.as_ref()).await;
        }
    }

    /// The server is authoritative for session identity
    async fn adopt_session(&mut self, session_id: String, origin: Option<&Pending>) {
        if let Err(e) = self.state.set_session_id(&session_id) {
            warn!("Could not persist session id: {}", e);
        }
        if self.session_id.as_deref() != Some(session_id.as_str()) {
            info!("Chat session is now {}", session_id);
            self.session_id = Some(session_id.clone());
            self.emit(ChatEvent::SessionChanged(Some(session_id.clone())));
        }

        let recorded = match origin.filter(|p| p.new_session) {
            Some(p) => self
                .history
                .record_local(SessionSummary::local(&session_id, &p.text, Utc::now())),
            None => false,
        };

        if !self.refresh_history().await && recorded {
            self.emit(ChatEvent::HistoryReplaced(self.history.clone()));
        }
    }

    fn on_server_error(&mut self, message: String, correlation_id: Option<String>) {
        warn!("Chat server error: {}", message);
        match self.pending.resolve(correlation_id.as_deref()) {
            Some(p) => self.emit(ChatEvent::PlaceholderFailed {
                id: p.id,
                reason: message,
            }),
            None => self.emit(ChatEvent::Notice(message)),
        }
    }

    // ---- history ----

    /// Merge the backend's session listing into the index.
    ///
    /// Returns `true` when the index was refreshed and emitted.
    pub async fn refresh_history(&mut self) -> bool {
        match self.state.access_token() {
            Ok(Some(_)) => {}
            Ok(None) => {
                debug!("Skipping history refresh for guest");
                return false;
            }
            Err(e) => {
                warn!("Could not read access token: {}", e);
                return false;
            }
        }

        match self.history_source.fetch_index().await {
            Ok(listing) => {
                self.history.reconcile(listing);
                self.emit(ChatEvent::HistoryReplaced(self.history.clone()));
                true
            }
            Err(lt_core::Error::Unauthorized) => {
                warn!("History refresh rejected, reauthentication required");
                self.emit(ChatEvent::ReauthRequired);
                false
            }
            Err(e) => {
                warn!(
                    "History refresh failed, keeping {} sessions: {}",
                    self.history.len(),
                    e
                );
                false
            }
        }
    }

    /// Show a stored session; the view stays read-only until the next
    /// refresh or end of session
    pub async fn load_session(&mut self, session_id: &str) -> bool {
        match self.history_source.fetch_session(session_id).await {
            Ok(records) => {
                info!("Loaded session {} ({} exchanges)", session_id, records.len());
                self.pending.clear();
                self.read_only = true;
                self.emit(ChatEvent::ViewReplaced {
                    session_id: session_id.to_string(),
                    records,
                });
                self.input_enabled = false;
                self.emit(ChatEvent::InputDisabled);
                true
            }
            Err(lt_core::Error::Unauthorized) => {
                self.emit(ChatEvent::ReauthRequired);
                false
            }
            Err(e) => {
                warn!("Failed to load session {}: {}", session_id, e);
                self.emit(ChatEvent::Notice(format!(
                    "Could not load session {}",
                    session_id
                )));
                false
            }
        }
    }

    // ---- session identity ----

    /// Forget the current session; the next send starts a new one
    pub fn end_session(&mut self) {
        self.pending.clear();
        if let Err(e) = self.state.clear_session_id() {
            warn!("Could not clear cached session id: {}", e);
        }
        self.session_id = None;
        self.read_only = false;
        self.emit(ChatEvent::SessionChanged(None));
        self.sync_input();
        debug!("Chat session ended");
    }

    /// User-triggered fresh start, counted against the daily refresh cap
    pub fn refresh(&mut self) -> bool {
        if !self.consume_quota(self.config.refresh_quota) {
            return false;
        }
        self.end_session();
        true
    }

    /// End the session, drop the credentials and reopen the socket as guest
    pub async fn logout(&mut self) {
        self.end_session();
        if let Err(e) = self.state.clear_credentials() {
            warn!("Could not clear credentials: {}", e);
        }
        self.history = HistoryIndex::new();
        self.emit(ChatEvent::HistoryReplaced(self.history.clone()));
        info!("Logged out");

        if self.connection_state != ConnectionState::Closed || self.reconnect_at.is_some() {
            self.reconnect().await;
        }
    }

    /// Best-effort teardown: forget the session and close without reconnecting
    pub fn shutdown(&mut self) {
        if let Err(e) = self.state.clear_session_id() {
            warn!("Could not clear cached session id: {}", e);
        }
        self.session_id = None;
        self.pending.clear();
        self.reconnect_at = None;
        self.connection = None;
        self.set_state(ConnectionState::Closed);
        info!("Chat session manager stopped");
    }

    // ---- helpers ----

    fn consume_quota(&mut self, quota: DailyQuota) -> bool {
        let today = (self.today)();
        match self.state.try_consume(&quota, today) {
            Ok(true) => true,
            Ok(false) => {
                self.emit(ChatEvent::QuotaExceeded(quota.kind));
                false
            }
            Err(e) => {
                // Advisory only; a broken store does not block the user
                warn!("Could not update {} quota: {}", quota.kind, e);
                true
            }
        }
    }

    fn fail_pending(&mut self, reason: &str) {
        for p in self.pending.drain() {
            self.emit(ChatEvent::PlaceholderFailed {
                id: p.id,
                reason: reason.to_string(),
            });
        }
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.connection_state == state {
            return;
        }
        debug!("Connection {} -> {}", self.connection_state, state);
        self.connection_state = state;
        self.emit(ChatEvent::ConnectionChanged(state));
        self.sync_input();
    }

    fn sync_input(&mut self) {
        let enabled = self.connection_state == ConnectionState::Open && !self.read_only;
        if enabled == self.input_enabled {
            return;
        }
        self.input_enabled = enabled;
        self.emit(if enabled {
            ChatEvent::InputEnabled
        } else {
            ChatEvent::InputDisabled
        });
    }

    fn emit(&self, event: ChatEvent) {
        if self.events.send(event).is_err() {
            debug!("Chat event dropped, no listener");
        }
    }
}
