use crate::config::{AuthMethod, HostKeyPolicy, SshConnectConfig};
use anyhow::Result;
use russh::client::{Config as ClientConfig, Handle};
use russh::keys::key::PrivateKeyWithHashAlg;
use russh::keys::{decode_secret_key, Algorithm, HashAlg};
use russh::{client, ChannelMsg, ChannelWriteHalf, Disconnect};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShellEvent {
    Stdout(Vec<u8>),
    Stderr(Vec<u8>),
    ExitStatus(u32),
    /// The channel closed. Always the last event.
    Closed,
}

#[derive(Clone)]
pub struct SshClient;

#[derive(Clone)]
pub struct SshSession {
    inner: Arc<Mutex<SessionInner>>,
}

struct SessionInner {
    handle: Handle<ClientHandler>,
    config: SshConnectConfig,
}

pub struct SshShell {
    writer: ChannelWriteHalf<russh::client::Msg>,
    events: mpsc::Receiver<ShellEvent>,
}

impl SshClient {
    pub async fn connect(cfg: SshConnectConfig) -> Result<SshSession> {
        let timeout = Duration::from_millis(cfg.connect_timeout_ms);
        match tokio::time::timeout(timeout, Self::handshake(&cfg)).await {
            Ok(result) => {
                let handle = result?;
                Ok(SshSession {
                    inner: Arc::new(Mutex::new(SessionInner {
                        handle,
                        config: cfg,
                    })),
                })
            }
            Err(_) => Err(anyhow::anyhow!("Timed out while waiting for handshake")),
        }
    }

    async fn handshake(cfg: &SshConnectConfig) -> Result<Handle<ClientHandler>> {
        let config = Arc::new(build_client_config(cfg));
        let handler = ClientHandler {
            host: cfg.host.clone(),
            port: cfg.port,
            policy: cfg.host_key_policy.clone(),
        };
        let sock = tokio::net::TcpStream::connect((cfg.host.as_str(), cfg.port)).await?;
        let mut handle = client::connect_stream(config, sock, handler).await?;
        authenticate(&mut handle, &cfg.username, &cfg.auth_method).await?;
        debug!(host = %cfg.host, port = cfg.port, "ssh authenticated");
        Ok(handle)
    }
}

impl SshSession {
    pub async fn open_shell(&self) -> Result<SshShell> {
        let inner = self.inner.lock().await;
        let channel = inner.handle.channel_open_session().await?;
        channel
            .request_pty(
                true,
                &inner.config.term,
                inner.config.term_width,
                inner.config.term_height,
                0,
                0,
                &[],
            )
            .await?;
        channel.request_shell(true).await?;

        let (mut reader, writer) = channel.split();
        let (tx, rx) = mpsc::channel(1024);

        tokio::spawn(async move {
            while let Some(msg) = reader.wait().await {
                let event = match msg {
                    ChannelMsg::Data { data } => ShellEvent::Stdout(data.to_vec()),
                    ChannelMsg::ExtendedData { data, ext } if ext == 1 => {
                        ShellEvent::Stderr(data.to_vec())
                    }
                    ChannelMsg::ExitStatus { exit_status } => ShellEvent::ExitStatus(exit_status),
                    ChannelMsg::Close => break,
                    _ => continue,
                };
                if tx.send(event).await.is_err() {
                    return;
                }
            }
            let _ = tx.send(ShellEvent::Closed).await;
        });

        Ok(SshShell { writer, events: rx })
    }

    pub async fn disconnect(&self) -> Result<()> {
        let inner = self.inner.lock().await;
        if inner.handle.is_closed() {
            return Ok(());
        }
        inner
            .handle
            .disconnect(Disconnect::ByApplication, "", "English")
            .await?;
        Ok(())
    }
}

impl SshShell {
    pub async fn write(&mut self, data: &[u8]) -> Result<()> {
        let mut writer = self.writer.make_writer();
        writer.write_all(data).await?;
        writer.flush().await?;
        Ok(())
    }

    pub async fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.writer.window_change(width, height, 0, 0).await?;
        Ok(())
    }

    pub async fn next_event(&mut self) -> Option<ShellEvent> {
        self.events.recv().await
    }
}

#[derive(Clone)]
struct ClientHandler {
    host: String,
    port: u16,
    policy: HostKeyPolicy,
}

impl client::Handler for ClientHandler {
    type Error = anyhow::Error;

    fn check_server_key(
        &mut self,
        server_public_key: &russh::keys::PublicKey,
    ) -> impl std::future::Future<Output = Result<bool, Self::Error>> + Send {
        let fingerprint = server_public_key.fingerprint(HashAlg::Sha256).to_string();
        let host = self.host.clone();
        let port = self.port;
        let policy = self.policy.clone();
        async move {
            match policy {
                HostKeyPolicy::InsecureAcceptAny => {
                    debug!(%fingerprint, "accepting host key for {}:{}", host, port);
                    Ok(true)
                }
                HostKeyPolicy::Pinned(allowed) => {
                    if allowed.iter().any(|f| fingerprint_matches(f, &fingerprint)) {
                        Ok(true)
                    } else {
                        warn!(%fingerprint, "host key for {}:{} is not pinned", host, port);
                        Ok(false)
                    }
                }
            }
        }
    }
}

fn fingerprint_matches(pinned: &str, actual: &str) -> bool {
    let pinned = pinned.trim();
    pinned == actual || actual.strip_prefix("SHA256:") == Some(pinned)
}

fn build_client_config(cfg: &SshConnectConfig) -> ClientConfig {
    ClientConfig {
        keepalive_interval: Some(Duration::from_secs(cfg.keepalive_interval_secs)),
        keepalive_max: 3,
        ..Default::default()
    }
}

async fn authenticate(
    handle: &mut Handle<ClientHandler>,
    username: &str,
    auth: &AuthMethod,
) -> Result<()> {
    let user = username.to_string();
    let res = match auth {
        AuthMethod::Password { password } => {
            handle
                .authenticate_password(user, password.to_string())
                .await?
        }
        AuthMethod::Key {
            private_key,
            passphrase,
        } => {
            let key = decode_secret_key(private_key, passphrase.as_ref().map(|v| v.as_str()))
                .map_err(|e| anyhow::anyhow!("Cannot parse privateKey: {}", e))?;
            let hash = if matches!(key.algorithm(), Algorithm::Rsa { .. }) {
                handle.best_supported_rsa_hash().await?.flatten()
            } else {
                None
            };
            let key_with_hash = PrivateKeyWithHashAlg::new(Arc::new(key), hash);
            handle.authenticate_publickey(user, key_with_hash).await?
        }
        AuthMethod::None => handle.authenticate_none(user).await?,
    };
    match res {
        russh::client::AuthResult::Success => Ok(()),
        russh::client::AuthResult::Failure { .. } => Err(anyhow::anyhow!(
            "All configured authentication methods failed"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pinned_fingerprint_accepts_bare_digest() {
        let actual = "SHA256:abc123";
        assert!(fingerprint_matches("SHA256:abc123", actual));
        assert!(fingerprint_matches(" abc123 ", actual));
        assert!(!fingerprint_matches("abc124", actual));
    }

    #[tokio::test]
    async fn unreachable_host_fails_within_timeout() {
        let cfg = SshConnectConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            username: "u".to_string(),
            auth_method: AuthMethod::None,
            host_key_policy: HostKeyPolicy::InsecureAcceptAny,
            keepalive_interval_secs: 30,
            connect_timeout_ms: 2_000,
            term: "xterm-256color".to_string(),
            term_width: 80,
            term_height: 24,
        };
        assert!(SshClient::connect(cfg).await.is_err());
    }
}
