use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;
use tuicat_config::{BridgeConfig, HostKeyPolicyKind};
use tuicat_ssh::{AuthMethod, HostKeyPolicy, SshClient, SshConnectConfig, SshSession, SshShell};

pub use tuicat_ssh::ShellEvent;

/// Target and secrets from a `connect` frame.
#[derive(Clone)]
pub struct ConnectRequest {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: Option<String>,
    pub private_key: Option<String>,
}

impl std::fmt::Debug for ConnectRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectRequest")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// The authenticated client side of a connection.
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Ends the client. Must tolerate being called on a dead session.
    async fn end(&self);
}

/// The interactive stream of a connection.
#[async_trait]
pub trait RemoteShell: Send {
    async fn write(&mut self, data: &[u8]) -> Result<()>;
    async fn resize(&mut self, cols: u32, rows: u32) -> Result<()>;
    /// `None` or [`ShellEvent::Closed`] once the stream is gone.
    async fn next_event(&mut self) -> Option<ShellEvent>;
}

pub type OpenedShell = (Arc<dyn RemoteSession>, Box<dyn RemoteShell>);

#[async_trait]
pub trait ShellConnector: Send + Sync {
    async fn open(&self, request: ConnectRequest) -> Result<OpenedShell>;
}

/// Opens real SSH sessions with the bridge settings.
pub struct SshConnector {
    settings: BridgeConfig,
}

impl SshConnector {
    pub fn new(settings: BridgeConfig) -> Self {
        Self { settings }
    }

    fn connect_config(&self, request: ConnectRequest) -> SshConnectConfig {
        let host_key_policy = match self.settings.host_key_policy {
            HostKeyPolicyKind::AcceptAny => HostKeyPolicy::InsecureAcceptAny,
            HostKeyPolicyKind::Pinned => {
                HostKeyPolicy::Pinned(self.settings.pinned_fingerprints.clone())
            }
        };
        SshConnectConfig {
            host: request.host,
            port: request.port,
            username: request.username,
            auth_method: AuthMethod::from_secrets(request.password, request.private_key),
            host_key_policy,
            keepalive_interval_secs: self.settings.keepalive_interval_secs,
            connect_timeout_ms: self.settings.handshake_timeout_ms,
            term: self.settings.term.clone(),
            term_width: self.settings.term_width,
            term_height: self.settings.term_height,
        }
    }
}

#[async_trait]
impl ShellConnector for SshConnector {
    async fn open(&self, request: ConnectRequest) -> Result<OpenedShell> {
        let cfg = self.connect_config(request);
        debug!(host = %cfg.host, port = cfg.port, auth = cfg.auth_method.as_key(), "opening ssh session");
        let session = SshClient::connect(cfg).await?;
        let shell = match session.open_shell().await {
            Ok(shell) => shell,
            Err(err) => {
                session.end().await;
                return Err(err);
            }
        };
        Ok((Arc::new(session), Box::new(shell)))
    }
}

#[async_trait]
impl RemoteSession for SshSession {
    async fn end(&self) {
        if let Err(err) = self.disconnect().await {
            debug!(error = %err, "ssh disconnect failed");
        }
    }
}

#[async_trait]
impl RemoteShell for SshShell {
    async fn write(&mut self, data: &[u8]) -> Result<()> {
        SshShell::write(self, data).await
    }

    async fn resize(&mut self, cols: u32, rows: u32) -> Result<()> {
        SshShell::resize(self, cols, rows).await
    }

    async fn next_event(&mut self) -> Option<ShellEvent> {
        SshShell::next_event(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_config_follows_settings() {
        let settings = BridgeConfig {
            host_key_policy: HostKeyPolicyKind::Pinned,
            pinned_fingerprints: vec!["SHA256:abc".into()],
            handshake_timeout_ms: 5_000,
            ..BridgeConfig::default()
        };
        let cfg = SshConnector::new(settings).connect_config(ConnectRequest {
            host: "example.com".into(),
            port: 2222,
            username: "u".into(),
            password: None,
            private_key: Some("KEY".into()),
        });
        assert_eq!(cfg.port, 2222);
        assert_eq!(cfg.connect_timeout_ms, 5_000);
        assert_eq!(cfg.term, "xterm-256color");
        assert_eq!(cfg.auth_method.as_key(), "publickey");
        assert!(matches!(cfg.host_key_policy, HostKeyPolicy::Pinned(ref f) if f.len() == 1));
    }

    #[test]
    fn debug_hides_secrets() {
        let request = ConnectRequest {
            host: "h".into(),
            port: 22,
            username: "u".into(),
            password: Some("hunter2".into()),
            private_key: None,
        };
        assert!(!format!("{:?}", request).contains("hunter2"));
    }
}
