//! Chat socket transport
//!
//! A [`Transport`] opens one persistent connection and hands back a
//! [`Connection`]: a sender for outbound text frames and a receiver of
//! inbound frames and the final close. [`WsTransport`] is the
//! tokio-tungstenite implementation.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{ChatError, Result};

/// Something that happened on an open connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Text frame from the server
    Frame(String),
    /// The connection ended; no further events follow
    Closed(Option<String>),
}

/// Both directions of an open connection
#[derive(Debug)]
pub struct Connection {
    outbound: mpsc::UnboundedSender<String>,
    inbound: mpsc::UnboundedReceiver<TransportEvent>,
}

impl Connection {
    pub fn new(
        outbound: mpsc::UnboundedSender<String>,
        inbound: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> Self {
        Self { outbound, inbound }
    }

    /// Queue a text frame for transmission
    pub fn send(&self, frame: String) -> Result<()> {
        self.outbound
            .send(frame)
            .map_err(|_| ChatError::ConnectionClosed)
    }

    /// Next inbound event; `None` once the transport side is gone
    pub async fn recv(&mut self) -> Option<TransportEvent> {
        self.inbound.recv().await
    }
}

/// Opens chat connections
#[async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self, url: &str) -> Result<Connection>;
}

/// Build the chat endpoint URL, adding the access token as a query credential
pub fn chat_url(base: &str, token: Option<&str>) -> Result<String> {
    let mut url = Url::parse(base)?;
    if let Some(token) = token.filter(|t| !t.is_empty()) {
        url.query_pairs_mut().append_pair("token", token);
    }
    Ok(url.into())
}

/// WebSocket transport built on tokio-tungstenite
#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransport;

impl WsTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn open(&self, url: &str) -> Result<Connection> {
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| ChatError::WebSocket(e.to_string()))?;

        info!(
            "Connected to chat socket: {}",
            url.split('?').next().unwrap_or(url)
        );

        let (mut write, mut read) = ws_stream.split();

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<TransportEvent>();
        let (ctrl_tx, mut ctrl_rx) = mpsc::unbounded_channel::<WsMessage>();

        // Task to write frames to the server
        tokio::spawn(async move {
            loop {
                let message = tokio::select! {
                    text = out_rx.recv() => match text {
                        Some(text) => WsMessage::Text(text.into()),
                        None => break,
                    },
                    ctrl = ctrl_rx.recv() => match ctrl {
                        Some(ctrl) => ctrl,
                        None => break,
                    },
                };
                if let Err(e) = write.send(message).await {
                    debug!("Chat socket write failed: {}", e);
                    break;
                }
            }
            let _ = write.close().await;
            debug!("Chat socket writer ended");
        });

        // Task to read frames from the server
        tokio::spawn(async move {
            let mut reason = None;
            while let Some(message) = read.next().await {
                match message {
                    Ok(WsMessage::Text(text)) => {
                        if in_tx
                            .send(TransportEvent::Frame(text.as_str().to_string()))
                            .is_err()
                        {
                            debug!("Connection dropped by owner");
                            return;
                        }
                    }
                    Ok(WsMessage::Ping(data)) => {
                        let _ = ctrl_tx.send(WsMessage::Pong(data));
                    }
                    Ok(WsMessage::Close(frame)) => {
                        reason = frame.map(|f| f.reason.as_str().to_string());
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Chat socket error: {}", e);
                        reason = Some(e.to_string());
                        break;
                    }
                }
            }
            let _ = in_tx.send(TransportEvent::Closed(reason));
        });

        Ok(Connection::new(out_tx, in_rx))
    }
}
