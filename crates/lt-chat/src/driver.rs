//! Actor driver for the session manager
//!
//! The manager runs in one task; callers hold a cloneable [`ChatHandle`]
//! and observe the manager through its event channel.

use std::ops::ControlFlow;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use lt_core::Position;

use crate::error::{ChatError, Result};
use crate::manager::{ChatSessionManager, SendOutcome};

/// User intents accepted by the running manager
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Connect,
    /// Reopen the socket, e.g. after the credentials changed
    Reconnect,
    Send { text: String, position: Position },
    RefreshHistory,
    LoadSession(String),
    /// Fresh session, counted against the daily refresh cap
    Refresh,
    EndSession,
    Logout,
    Shutdown,
}

/// Cloneable handle to a running [`ChatSessionManager`]
#[derive(Debug, Clone)]
pub struct ChatHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl ChatHandle {
    pub fn dispatch(&self, command: Command) -> Result<()> {
        self.tx
            .send(command)
            .map_err(|e| ChatError::ChannelSend(e.to_string()))
    }

    pub fn connect(&self) -> Result<()> {
        self.dispatch(Command::Connect)
    }

    pub fn reconnect(&self) -> Result<()> {
        self.dispatch(Command::Reconnect)
    }

    pub fn send(&self, text: impl Into<String>, position: Position) -> Result<()> {
        self.dispatch(Command::Send {
            text: text.into(),
            position,
        })
    }

    pub fn refresh_history(&self) -> Result<()> {
        self.dispatch(Command::RefreshHistory)
    }

    pub fn load_session(&self, session_id: impl Into<String>) -> Result<()> {
        self.dispatch(Command::LoadSession(session_id.into()))
    }

    pub fn refresh(&self) -> Result<()> {
        self.dispatch(Command::Refresh)
    }

    pub fn end_session(&self) -> Result<()> {
        self.dispatch(Command::EndSession)
    }

    pub fn logout(&self) -> Result<()> {
        self.dispatch(Command::Logout)
    }

    pub fn shutdown(&self) -> Result<()> {
        self.dispatch(Command::Shutdown)
    }
}

impl ChatSessionManager {
    /// Run the manager on its own task
    pub fn spawn(self) -> (ChatHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(self.run(rx));
        (ChatHandle { tx }, task)
    }

    /// Process commands, transport events and the reconnect deadline until
    /// shutdown or until every handle is dropped
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        info!("Chat session manager started");
        loop {
            let deadline = self.reconnect_deadline();
            tokio::select! {
                command = commands.recv() => {
                    let Some(command) = command else { break };
                    if self.execute(command).await.is_break() {
                        break;
                    }
                }
                event = self.next_transport_event() => {
                    self.handle_transport_event(event).await;
                }
                _ = wait_until(deadline) => self.poll_reconnect().await,
            }
        }
        self.shutdown();
    }

    async fn execute(&mut self, command: Command) -> ControlFlow<()> {
        debug!("Command: {:?}", command);
        match command {
            Command::Connect => self.connect().await,
            Command::Reconnect => self.reconnect().await,
            Command::Send { text, position } => {
                if let SendOutcome::Rejected(reason) = self.send_message(&text, position) {
                    debug!("Message not sent: {:?}", reason);
                }
            }
            Command::RefreshHistory => {
                self.refresh_history().await;
            }
            Command::LoadSession(session_id) => {
                self.load_session(&session_id).await;
            }
            Command::Refresh => {
                self.refresh();
            }
            Command::EndSession => self.end_session(),
            Command::Logout => self.logout().await,
            Command::Shutdown => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
