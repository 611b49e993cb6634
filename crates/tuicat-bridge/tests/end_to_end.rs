use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tuicat_bridge::{
    serve_on, AppState, ConnectRequest, OpenedShell, RemoteSession, RemoteShell, ShellConnector,
    ShellEvent,
};
use tuicat_core::credentials::{CREDENTIALS_KEY, TIMESTAMP_KEY};
use tuicat_core::{
    CredentialCache, Ingest, KeyValueStore, MemoryStore, SessionClient, SessionUpdate,
    SshCredentials, StaticLocator,
};

#[derive(Default)]
struct Ends(AtomicUsize);

#[async_trait]
impl RemoteSession for Ends {
    async fn end(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Echoes every write back as stdout. `hangup` closes the shell instead.
struct EchoShell {
    tx: mpsc::UnboundedSender<ShellEvent>,
    rx: mpsc::UnboundedReceiver<ShellEvent>,
}

#[async_trait]
impl RemoteShell for EchoShell {
    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let event = if data == b"hangup\r" {
            ShellEvent::Closed
        } else {
            ShellEvent::Stdout(data.to_vec())
        };
        let _ = self.tx.send(event);
        Ok(())
    }

    async fn resize(&mut self, _cols: u32, _rows: u32) -> Result<()> {
        Ok(())
    }

    async fn next_event(&mut self) -> Option<ShellEvent> {
        self.rx.recv().await
    }
}

struct FakeConnector {
    ends: Arc<Ends>,
}

#[async_trait]
impl ShellConnector for FakeConnector {
    async fn open(&self, request: ConnectRequest) -> Result<OpenedShell> {
        if request.password.as_deref() != Some("secret") {
            anyhow::bail!("All configured authentication methods failed");
        }
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(ShellEvent::Stdout(
            format!("Welcome\r\n{}@{}:~$ ", request.username, request.host).into_bytes(),
        ))?;
        Ok((self.ends.clone(), Box::new(EchoShell { tx, rx })))
    }
}

async fn start_bridge(ends: Arc<Ends>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = AppState::new(Arc::new(FakeConnector { ends }), None);
    tokio::spawn(serve_on(listener, state));
    format!("ws://{}/ws", addr)
}

async fn next(client: &mut SessionClient) -> SessionUpdate {
    tokio::time::timeout(Duration::from_secs(5), client.next_update())
        .await
        .expect("bridge answered in time")
        .expect("socket still open")
}

/// Logs in as alice and consumes the welcome banner.
async fn connected_client(url: &str, cache: CredentialCache) -> SessionClient {
    let mut client = SessionClient::new(Arc::new(StaticLocator(url.to_string())), cache);
    client
        .connect(SshCredentials::with_password("box", "alice", "secret"))
        .await
        .unwrap();
    assert!(matches!(next(&mut client).await, SessionUpdate::Connected { .. }));
    assert!(matches!(next(&mut client).await, SessionUpdate::Output(_)));
    client
}

#[tokio::test]
async fn login_stream_and_disconnect() {
    let ends = Arc::new(Ends::default());
    let url = start_bridge(ends.clone()).await;
    let store = Arc::new(MemoryStore::new());
    let cache = CredentialCache::new(store);
    let mut client = SessionClient::new(Arc::new(StaticLocator(url)), cache.clone());

    client
        .connect(SshCredentials::with_password("box", "alice", "secret"))
        .await
        .unwrap();
    assert!(client.state().is_connecting);

    let update = next(&mut client).await;
    assert!(matches!(update, SessionUpdate::Connected { session_id: Some(_) }));
    assert!(client.state().is_connected);
    assert_eq!(cache.load().unwrap().map(|c| c.username), Some("alice".into()));

    let update = next(&mut client).await;
    assert!(matches!(update, SessionUpdate::Output(Ingest::Appended(_))));
    assert_eq!(client.state().remote_prompt.as_deref(), Some("alice@box"));

    client.send_input("ls").await.unwrap();
    let update = next(&mut client).await;
    assert_eq!(update, SessionUpdate::Output(Ingest::Appended("ls\r".into())));

    client.disconnect().await;
    assert_eq!(client.state(), &tuicat_core::SessionState::default());
    assert!(client.next_update().await.is_none());
    assert!(cache.load().unwrap().is_none());

    for _ in 0..50 {
        if ends.0.load(Ordering::SeqCst) == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(ends.0.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn rejected_login_surfaces_verbatim() {
    let ends = Arc::new(Ends::default());
    let url = start_bridge(ends.clone()).await;
    let cache = CredentialCache::new(Arc::new(MemoryStore::new()));
    let mut client = SessionClient::new(Arc::new(StaticLocator(url)), cache.clone());

    client
        .connect(SshCredentials::with_password("box", "alice", "wrong"))
        .await
        .unwrap();
    let update = next(&mut client).await;
    assert_eq!(
        update,
        SessionUpdate::Error("All configured authentication methods failed".into())
    );
    assert!(!client.state().is_connected);
    assert!(!client.state().is_connecting);
    assert!(cache.load().unwrap().is_none());
    assert_eq!(ends.0.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn exit_and_logout_forget_the_record_before_sending() {
    let url = start_bridge(Arc::new(Ends::default())).await;
    for command in ["  LogOut ", "EXIT\t"] {
        let cache = CredentialCache::new(Arc::new(MemoryStore::new()));
        let mut client = connected_client(&url, cache.clone()).await;
        assert!(cache.load().unwrap().is_some());

        client.send_input(command).await.unwrap();
        assert!(cache.load().unwrap().is_none());
        let update = next(&mut client).await;
        assert_eq!(
            update,
            SessionUpdate::Output(Ingest::Appended(format!("{}\r", command)))
        );
    }
}

#[tokio::test]
async fn silent_resume_keeps_transcript_and_timestamp() {
    let url = start_bridge(Arc::new(Ends::default())).await;
    let store = Arc::new(MemoryStore::new());
    let cache = CredentialCache::new(store.clone());
    let mut client = connected_client(&url, cache).await;
    let saved_at = store.get(TIMESTAMP_KEY).unwrap();
    assert!(saved_at.is_some());

    client.send_input("hangup").await.unwrap();
    assert_eq!(next(&mut client).await, SessionUpdate::Disconnected);
    assert!(!client.state().is_connected);
    assert!(client.state().output.ends_with("\nConnection closed.\n"));

    tokio::time::sleep(Duration::from_millis(5)).await;
    assert!(client.resume().await.unwrap());
    assert!(client.is_resuming());
    assert!(client.state().output.starts_with("Welcome"));

    let update = next(&mut client).await;
    assert!(matches!(update, SessionUpdate::Connected { session_id: Some(_) }));
    assert!(client.state().is_connected);
    assert!(!client.is_resuming());
    assert!(client.state().output.contains("Connection closed."));
    assert_eq!(store.get(TIMESTAMP_KEY).unwrap(), saved_at);
}

#[tokio::test]
async fn expired_record_is_dropped_instead_of_resumed() {
    let ends = Arc::new(Ends::default());
    let url = start_bridge(ends.clone()).await;
    let store = Arc::new(MemoryStore::new());
    let cache = CredentialCache::new(store.clone());
    let day_ago = Utc::now().timestamp_millis() - 24 * 60 * 60 * 1000;
    cache
        .save_at(&SshCredentials::with_password("box", "alice", "secret"), day_ago)
        .unwrap();

    let mut client = SessionClient::new(Arc::new(StaticLocator(url)), cache);
    assert!(!client.resume().await.unwrap());
    assert!(!client.state().is_connecting);
    assert!(client.next_update().await.is_none());
    assert_eq!(store.get(CREDENTIALS_KEY).unwrap(), None);
    assert_eq!(store.get(TIMESTAMP_KEY).unwrap(), None);
    assert_eq!(ends.0.load(Ordering::SeqCst), 0);
}
