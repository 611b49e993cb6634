//! Drives one logical SSH session against the bridge.
//!
//! [`SessionClient`] is owned by a single task. Every state change happens
//! inside its methods; the WebSocket reader runs in a spawned task that only
//! forwards frames through a channel, and [`SessionClient::next_update`]
//! applies them one at a time.

use crate::credentials::CredentialCache;
use crate::error::SessionError;
use crate::protocol::{ClientMessage, ServerMessage, SshCredentials};
use crate::session::{SessionState, SessionUpdate};
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const INBOUND_CAPACITY: usize = 256;

/// One-shot lookup of the bridge's WebSocket address.
#[async_trait]
pub trait BridgeLocator: Send + Sync {
    async fn websocket_url(&self) -> Result<String, SessionError>;
}

/// Asks the discovery endpoint for `websocketUrl`.
pub struct HttpLocator {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpLocator {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl BridgeLocator for HttpLocator {
    async fn websocket_url(&self) -> Result<String, SessionError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "action": "get_connection_info" }))
            .send()
            .await
            .map_err(|e| SessionError::Locator(format!("Failed to reach SSH proxy: {}", e)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SessionError::Locator(format!(
                "Failed to get SSH server connection info: {}",
                status.as_u16()
            )));
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| SessionError::Locator(format!("Invalid SSH proxy response: {}", e)))?;
        connection_info_url(&body)
    }
}

fn connection_info_url(body: &Value) -> Result<String, SessionError> {
    if !body.get("success").and_then(Value::as_bool).unwrap_or(false) {
        let message = body
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("SSH proxy API returned error");
        return Err(SessionError::Locator(message.to_string()));
    }
    match body.get("websocketUrl") {
        None | Some(Value::Null) => Err(SessionError::Locator(
            "No WebSocket URL provided by SSH proxy".to_string(),
        )),
        Some(Value::String(url)) if url.is_empty() => Err(SessionError::Locator(
            "No WebSocket URL provided by SSH proxy".to_string(),
        )),
        Some(Value::String(url)) => Ok(url.clone()),
        Some(other) => Err(SessionError::Locator(format!(
            "Invalid WebSocket URL type: {}",
            json_type_name(other)
        ))),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) | Value::Object(_) => "object",
    }
}

/// Fixed address, for direct connections and tests.
pub struct StaticLocator(pub String);

#[async_trait]
impl BridgeLocator for StaticLocator {
    async fn websocket_url(&self) -> Result<String, SessionError> {
        Ok(self.0.clone())
    }
}

enum Inbound {
    Frame(String),
    TransportError(String),
    Closed,
}

struct Link {
    sink: SplitSink<WsStream, Message>,
    inbound: mpsc::Receiver<Inbound>,
    reader: JoinHandle<()>,
    credentials: SshCredentials,
    silent: bool,
}

pub struct SessionClient {
    locator: Arc<dyn BridgeLocator>,
    cache: CredentialCache,
    state: SessionState,
    link: Option<Link>,
}

impl SessionClient {
    pub fn new(locator: Arc<dyn BridgeLocator>, cache: CredentialCache) -> Self {
        Self {
            locator,
            cache,
            state: SessionState::default(),
            link: None,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// True while a silent reconnect is waiting for `connected`.
    pub fn is_resuming(&self) -> bool {
        self.state.is_connecting && self.link.as_ref().map(|l| l.silent).unwrap_or(false)
    }

    pub fn clear_output(&mut self) {
        self.state.clear_output();
    }

    /// Manual login. A no-op while a session is connecting or connected.
    pub async fn connect(&mut self, credentials: SshCredentials) -> Result<(), SessionError> {
        if self.state.is_busy() {
            debug!("connect ignored, session busy");
            return Ok(());
        }
        if let Err(err) = self.open(credentials, false).await {
            self.state.fail(err.to_string());
            return Err(err);
        }
        Ok(())
    }

    /// Silently reconnects with the cached credentials. Returns whether an
    /// attempt was started.
    pub async fn resume(&mut self) -> Result<bool, SessionError> {
        if self.state.is_busy() {
            return Ok(false);
        }
        let credentials = match self.cache.load() {
            Ok(Some(credentials)) => credentials,
            Ok(None) => return Ok(false),
            Err(err) => {
                warn!(error = %err, "reconnect record unreadable");
                return Ok(false);
            }
        };
        info!(target_host = %credentials.host, "resuming cached session");
        match self.open(credentials, true).await {
            Ok(()) => Ok(true),
            Err(err) => {
                let err = SessionError::AutoReconnect(Box::new(err));
                self.state.fail(err.to_string());
                Err(err)
            }
        }
    }

    async fn open(&mut self, credentials: SshCredentials, silent: bool) -> Result<(), SessionError> {
        self.drop_link();
        self.state.begin_connect(silent);
        let url = self.locator.websocket_url().await?;
        if !url.starts_with("ws://") && !url.starts_with("wss://") {
            return Err(SessionError::InvalidUrl(url));
        }

        let (stream, _response) = connect_async(url.as_str()).await.map_err(|e| {
            warn!(error = %e, %url, "websocket open failed");
            SessionError::Transport(e.to_string())
        })?;
        let (mut sink, stream) = stream.split();
        let frame = ClientMessage::connect(&credentials)
            .to_json()
            .map_err(|e| SessionError::Transport(e.to_string()))?;
        sink.send(Message::Text(frame.into()))
            .await
            .map_err(|e| SessionError::Transport(e.to_string()))?;

        let (tx, inbound) = mpsc::channel(INBOUND_CAPACITY);
        let reader = tokio::spawn(pump(stream, tx));
        debug!(%url, silent, "connect frame sent");
        self.link = Some(Link {
            sink,
            inbound,
            reader,
            credentials,
            silent,
        });
        Ok(())
    }

    /// Waits for the next bridge event and applies it. `None` when no socket
    /// is open. Cancel-safe.
    pub async fn next_update(&mut self) -> Option<SessionUpdate> {
        loop {
            let link = self.link.as_mut()?;
            let event = link.inbound.recv().await;
            match event {
                Some(Inbound::Frame(text)) => match ServerMessage::parse(&text) {
                    Ok(Some(message)) => {
                        if matches!(message, ServerMessage::Connected { .. }) && !link.silent {
                            if let Err(err) = self.cache.save(&link.credentials) {
                                warn!(error = %err, "failed to persist reconnect record");
                            }
                        }
                        let finished = matches!(message, ServerMessage::Disconnected);
                        let update = self.state.apply(message);
                        if finished {
                            self.drop_link();
                        }
                        return Some(update);
                    }
                    Ok(None) => debug!("ignoring frame with unknown type"),
                    Err(err) => {
                        warn!(error = %err, "malformed server frame");
                        return Some(self.state.parse_failure());
                    }
                },
                Some(Inbound::TransportError(err)) => {
                    warn!(error = %err, "websocket error");
                    let message = if link.silent {
                        SessionError::AutoReconnect(Box::new(SessionError::Transport(err)))
                    } else {
                        SessionError::Transport(err)
                    };
                    return Some(self.state.fail(message.to_string()));
                }
                Some(Inbound::Closed) | None => {
                    self.drop_link();
                    return Some(self.state.transport_closed());
                }
            }
        }
    }

    /// Sends a command line. `exit`/`logout` drop the reconnect record first.
    pub async fn send_input(&mut self, text: &str) -> Result<(), SessionError> {
        if !self.state.is_connected || self.link.is_none() {
            return Ok(());
        }
        let command = text.trim().to_lowercase();
        if command == "exit" || command == "logout" {
            if let Err(err) = self.cache.clear() {
                warn!(error = %err, "failed to clear reconnect record");
            }
        }
        self.send(ClientMessage::Input {
            data: format!("{}\r", text),
        })
        .await
    }

    /// Sends bytes verbatim, for control keys.
    pub async fn send_keys(&mut self, data: &str) -> Result<(), SessionError> {
        if !self.state.is_connected {
            return Ok(());
        }
        self.send(ClientMessage::Input {
            data: data.to_string(),
        })
        .await
    }

    pub async fn resize(&mut self, cols: u16, rows: u16) -> Result<(), SessionError> {
        if !self.state.is_connected {
            return Ok(());
        }
        self.send(ClientMessage::Resize {
            cols: Some(cols as u32),
            rows: Some(rows as u32),
        })
        .await
    }

    /// Ends the session, resets every field and forgets the reconnect record.
    pub async fn disconnect(&mut self) {
        if let Some(mut link) = self.link.take() {
            if let Ok(frame) = ClientMessage::Disconnect.to_json() {
                if let Err(err) = link.sink.send(Message::Text(frame.into())).await {
                    debug!(error = %err, "disconnect frame not delivered");
                }
            }
            if let Err(err) = link.sink.send(Message::Close(None)).await {
                debug!(error = %err, "close frame not delivered");
            }
            link.reader.abort();
        }
        self.state.reset();
        if let Err(err) = self.cache.clear() {
            warn!(error = %err, "failed to clear reconnect record");
        }
    }

    async fn send(&mut self, message: ClientMessage) -> Result<(), SessionError> {
        let Some(link) = self.link.as_mut() else {
            return Ok(());
        };
        let frame = message
            .to_json()
            .map_err(|e| SessionError::Transport(e.to_string()))?;
        if let Err(err) = link.sink.send(Message::Text(frame.into())).await {
            warn!(error = %err, "websocket send failed");
            let err = SessionError::Transport(err.to_string());
            self.state.fail(err.to_string());
            return Err(err);
        }
        Ok(())
    }

    fn drop_link(&mut self) {
        if let Some(link) = self.link.take() {
            link.reader.abort();
        }
    }
}

impl Drop for SessionClient {
    fn drop(&mut self) {
        self.drop_link();
    }
}

async fn pump(mut stream: SplitStream<WsStream>, tx: mpsc::Sender<Inbound>) {
    while let Some(item) = stream.next().await {
        let inbound = match item {
            Ok(Message::Text(text)) => Inbound::Frame(text.as_str().to_string()),
            Ok(Message::Binary(bytes)) => {
                Inbound::Frame(String::from_utf8_lossy(&bytes).into_owned())
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(err) => {
                let _ = tx.send(Inbound::TransportError(err.to_string())).await;
                break;
            }
        };
        if tx.send(inbound).await.is_err() {
            return;
        }
    }
    let _ = tx.send(Inbound::Closed).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn client_with(url: &str) -> (SessionClient, CredentialCache) {
        let cache = CredentialCache::new(Arc::new(MemoryStore::new()));
        let client = SessionClient::new(Arc::new(StaticLocator(url.to_string())), cache.clone());
        (client, cache)
    }

    #[test]
    fn connection_info_parsing() {
        let ok = json!({"success": true, "websocketUrl": "wss://x/ws"});
        assert_eq!(connection_info_url(&ok).unwrap(), "wss://x/ws");

        let failed = json!({"success": false, "error": "not configured"});
        assert_eq!(
            connection_info_url(&failed).unwrap_err().to_string(),
            "not configured"
        );

        let missing = json!({"success": true});
        assert_eq!(
            connection_info_url(&missing).unwrap_err().to_string(),
            "No WebSocket URL provided by SSH proxy"
        );

        let numeric = json!({"success": true, "websocketUrl": 5});
        assert_eq!(
            connection_info_url(&numeric).unwrap_err().to_string(),
            "Invalid WebSocket URL type: number"
        );
    }

    #[tokio::test]
    async fn rejects_non_websocket_url() {
        let (mut client, _) = client_with("http://bridge.local/ws");
        let err = client
            .connect(SshCredentials::with_password("h", "u", "p"))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid WebSocket URL format: http://bridge.local/ws"
        );
        assert!(!client.state().is_connecting);
        assert_eq!(
            client.state().error.as_deref(),
            Some("Invalid WebSocket URL format: http://bridge.local/ws")
        );
    }

    #[tokio::test]
    async fn unreachable_bridge_is_transport_error() {
        let (mut client, _) = client_with("ws://127.0.0.1:1/ws");
        let err = client
            .connect(SshCredentials::with_password("h", "u", "p"))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Transport(_)));
        assert_eq!(
            client.state().error.as_deref(),
            Some("WebSocket connection failed. Please check your connection and try again.")
        );
    }

    #[tokio::test]
    async fn resume_without_record_does_nothing() {
        let (mut client, _) = client_with("ws://127.0.0.1:1/ws");
        assert!(!client.resume().await.unwrap());
        assert!(!client.state().is_connecting);
    }

    #[tokio::test]
    async fn failed_resume_reports_auto_reconnect() {
        let (mut client, cache) = client_with("ws://127.0.0.1:1/ws");
        cache
            .save(&SshCredentials::with_password("h", "u", "p"))
            .unwrap();
        let err = client.resume().await.unwrap_err();
        assert!(matches!(err, SessionError::AutoReconnect(_)));
        assert_eq!(
            client.state().error.as_deref(),
            Some("Failed to auto-reconnect to SSH session")
        );
    }

    #[tokio::test]
    async fn input_is_ignored_when_disconnected() {
        let (mut client, cache) = client_with("ws://127.0.0.1:1/ws");
        cache
            .save(&SshCredentials::with_password("h", "u", "p"))
            .unwrap();
        client.send_input("exit").await.unwrap();
        assert!(cache.load().unwrap().is_some());
    }
}
