//! Per-socket actor. One WebSocket drives at most one remote shell; every
//! terminal event funnels into [`ConnectionRecord::release`], which runs once.

use crate::connector::{ConnectRequest, OpenedShell, RemoteShell, ShellConnector, ShellEvent};
use crate::registry::{ConnectionRecord, ConnectionRegistry};
use crate::utf8::Utf8Carry;
use anyhow::Result;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};
use tuicat_core::protocol::DEFAULT_SSH_PORT;
use tuicat_core::{ClientMessage, ServerMessage};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BridgeState {
    Idle,
    Connecting,
    Ready,
    Streaming,
    Closed,
}

/// Outbound half of the socket. Returns `false` once the peer is gone.
#[async_trait::async_trait]
pub trait FrameSink: Send {
    async fn send_frame(&mut self, message: ServerMessage) -> bool;
}

#[async_trait::async_trait]
impl FrameSink for SplitSink<WebSocket, Message> {
    async fn send_frame(&mut self, message: ServerMessage) -> bool {
        match message.to_json() {
            Ok(text) => self.send(Message::Text(text.into())).await.is_ok(),
            Err(err) => {
                warn!(error = %err, "failed to serialize server frame");
                true
            }
        }
    }
}

pub struct Connection<S: FrameSink> {
    id: String,
    state: BridgeState,
    sink: S,
    connector: Arc<dyn ShellConnector>,
    registry: ConnectionRegistry,
    pending: Option<JoinHandle<Result<OpenedShell>>>,
    shell: Option<Box<dyn RemoteShell>>,
    record: Option<Arc<ConnectionRecord>>,
    stdout: Utf8Carry,
    stderr: Utf8Carry,
}

/// Serves one upgraded socket until the peer goes away.
pub async fn serve_socket(
    socket: WebSocket,
    connector: Arc<dyn ShellConnector>,
    registry: ConnectionRegistry,
) {
    let (sink, mut stream) = socket.split();
    let mut conn = Connection::new(sink, connector, registry);
    info!(connection_id = %conn.id, "websocket accepted");

    loop {
        let keep_going = tokio::select! {
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => conn.on_text(&text).await,
                Some(Ok(Message::Binary(bytes))) => {
                    conn.on_text(&String::from_utf8_lossy(&bytes)).await
                }
                Some(Ok(Message::Close(_))) | None => false,
                Some(Ok(_)) => true,
                Some(Err(err)) => {
                    debug!(connection_id = %conn.id, error = %err, "websocket error");
                    false
                }
            },
            opened = join_pending(&mut conn.pending) => conn.on_opened(opened).await,
            event = next_shell_event(&mut conn.shell) => conn.on_shell_event(event).await,
        };
        if !keep_going {
            break;
        }
    }

    conn.shutdown().await;
}

async fn join_pending(
    pending: &mut Option<JoinHandle<Result<OpenedShell>>>,
) -> Result<Result<OpenedShell>, JoinError> {
    match pending {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

async fn next_shell_event(shell: &mut Option<Box<dyn RemoteShell>>) -> Option<ShellEvent> {
    match shell {
        Some(shell) => shell.next_event().await,
        None => std::future::pending().await,
    }
}

impl<S: FrameSink> Connection<S> {
    pub fn new(sink: S, connector: Arc<dyn ShellConnector>, registry: ConnectionRegistry) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            state: BridgeState::Idle,
            sink,
            connector,
            registry,
            pending: None,
            shell: None,
            record: None,
            stdout: Utf8Carry::default(),
            stderr: Utf8Carry::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    fn transition(&mut self, next: BridgeState) {
        debug!(connection_id = %self.id, from = ?self.state, to = ?next, "state change");
        self.state = next;
    }

    /// Handles one client frame. Returns `false` when the socket is gone.
    pub async fn on_text(&mut self, text: &str) -> bool {
        let message = match ClientMessage::parse(text) {
            Ok(Some(message)) => message,
            Ok(None) => {
                debug!(connection_id = %self.id, "ignoring frame with unknown type");
                return true;
            }
            Err(err) => {
                warn!(connection_id = %self.id, error = %err, "malformed client frame");
                return self
                    .sink
                    .send_frame(ServerMessage::error(format!("Invalid message format: {}", err)))
                    .await;
            }
        };

        match message {
            ClientMessage::Connect {
                host,
                port,
                username,
                password,
                private_key,
            } => {
                let request = ConnectRequest {
                    host,
                    port: port.filter(|p| *p != 0).unwrap_or(DEFAULT_SSH_PORT),
                    username,
                    password,
                    private_key,
                };
                self.begin_connect(request).await
            }
            ClientMessage::Input { data } => self.on_input(data.as_bytes()).await,
            ClientMessage::Resize { cols, rows } => {
                self.on_resize(cols, rows).await;
                true
            }
            ClientMessage::Disconnect => self.on_disconnect().await,
        }
    }

    async fn begin_connect(&mut self, request: ConnectRequest) -> bool {
        match self.state {
            BridgeState::Idle => {}
            BridgeState::Closed => {
                return self
                    .sink
                    .send_frame(ServerMessage::error(
                        "Session closed. Open a new connection to reconnect.",
                    ))
                    .await;
            }
            _ => {
                return self
                    .sink
                    .send_frame(ServerMessage::error("Already connected"))
                    .await;
            }
        }
        info!(
            connection_id = %self.id,
            host = %request.host,
            port = request.port,
            user = %request.username,
            "connecting"
        );
        self.transition(BridgeState::Connecting);
        let connector = self.connector.clone();
        self.pending = Some(tokio::spawn(async move { connector.open(request).await }));
        true
    }

    /// Completion of the connect task.
    pub async fn on_opened(&mut self, opened: Result<Result<OpenedShell>, JoinError>) -> bool {
        self.pending = None;
        match opened {
            Ok(Ok((session, shell))) => {
                self.transition(BridgeState::Ready);
                let record = Arc::new(ConnectionRecord::new(self.id.clone(), session));
                self.registry.insert(record.clone());
                self.record = Some(record);
                self.shell = Some(shell);
                self.transition(BridgeState::Streaming);
                self.sink
                    .send_frame(ServerMessage::Connected {
                        session_id: Some(self.id.clone()),
                    })
                    .await
            }
            Ok(Err(err)) => {
                warn!(connection_id = %self.id, error = %err, "ssh connect failed");
                self.transition(BridgeState::Closed);
                self.sink.send_frame(ServerMessage::error(err.to_string())).await
            }
            Err(err) => {
                warn!(connection_id = %self.id, error = %err, "connect task aborted");
                self.transition(BridgeState::Closed);
                self.sink
                    .send_frame(ServerMessage::error("Connection attempt aborted"))
                    .await
            }
        }
    }

    async fn on_input(&mut self, data: &[u8]) -> bool {
        if self.state != BridgeState::Streaming {
            debug!(connection_id = %self.id, state = ?self.state, "input outside streaming ignored");
            return true;
        }
        let Some(shell) = self.shell.as_mut() else {
            return true;
        };
        if let Err(err) = shell.write(data).await {
            warn!(connection_id = %self.id, error = %err, "shell write failed");
            let alive = self.sink.send_frame(ServerMessage::error(err.to_string())).await;
            self.close().await;
            return alive;
        }
        true
    }

    async fn on_resize(&mut self, cols: Option<u32>, rows: Option<u32>) {
        if self.state != BridgeState::Streaming {
            return;
        }
        let (Some(cols), Some(rows)) = (cols, rows) else {
            return;
        };
        if cols == 0 || rows == 0 {
            return;
        }
        if let Some(shell) = self.shell.as_mut() {
            if let Err(err) = shell.resize(cols, rows).await {
                warn!(connection_id = %self.id, error = %err, "window change failed");
            }
        }
    }

    async fn on_disconnect(&mut self) -> bool {
        match self.state {
            BridgeState::Connecting => {
                if let Some(pending) = self.pending.take() {
                    pending.abort();
                }
                info!(connection_id = %self.id, "connect aborted by client");
            }
            BridgeState::Ready | BridgeState::Streaming => {
                info!(connection_id = %self.id, "disconnect requested");
            }
            BridgeState::Idle | BridgeState::Closed => return true,
        }
        self.close().await;
        self.sink.send_frame(ServerMessage::Disconnected).await
    }

    /// One shell event. Returns `false` when the socket is gone.
    pub async fn on_shell_event(&mut self, event: Option<ShellEvent>) -> bool {
        match event {
            Some(ShellEvent::Stdout(bytes)) => {
                let data = self.stdout.decode(&bytes);
                if data.is_empty() {
                    return true;
                }
                self.sink.send_frame(ServerMessage::Output { data }).await
            }
            Some(ShellEvent::Stderr(bytes)) => {
                let data = self.stderr.decode(&bytes);
                if data.is_empty() {
                    return true;
                }
                self.sink.send_frame(ServerMessage::Error { data }).await
            }
            Some(ShellEvent::ExitStatus(code)) => {
                debug!(connection_id = %self.id, code, "remote shell exited");
                true
            }
            Some(ShellEvent::Closed) | None => {
                info!(connection_id = %self.id, "shell stream closed");
                let mut alive = true;
                let tail = self.stdout.flush();
                if !tail.is_empty() {
                    alive = self.sink.send_frame(ServerMessage::Output { data: tail }).await;
                }
                self.close().await;
                alive && self.sink.send_frame(ServerMessage::Disconnected).await
            }
        }
    }

    async fn close(&mut self) {
        self.shell = None;
        if let Some(record) = self.record.take() {
            record.release(&self.registry).await;
        }
        self.transition(BridgeState::Closed);
    }

    /// Socket-side teardown. Safe after any other path already released.
    pub async fn shutdown(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
        self.shell = None;
        if let Some(record) = self.record.take() {
            record.release(&self.registry).await;
        }
        if self.state != BridgeState::Closed {
            self.transition(BridgeState::Closed);
        }
        info!(connection_id = %self.id, "websocket closed");
    }
}
