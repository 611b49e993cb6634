use crate::paths::AppPaths;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Externally reachable WebSocket URL of the bridge. Wins over every file
/// layer; command-line overrides still win over it.
pub const WEBSOCKET_URL_ENV: &str = "TUICAT_WEBSOCKET_URL";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub bridge: BridgeConfig,
    pub client: ClientConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct AppConfigLayer {
    pub bridge: Option<BridgeConfigLayer>,
    pub client: Option<ClientConfigLayer>,
    pub logging: Option<LoggingConfigLayer>,
}

impl AppConfigLayer {
    pub fn apply_to(self, cfg: &mut AppConfig) {
        if let Some(layer) = self.bridge {
            cfg.bridge.apply(layer);
        }
        if let Some(layer) = self.client {
            cfg.client.apply(layer);
        }
        if let Some(layer) = self.logging {
            cfg.logging.apply(layer);
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum HostKeyPolicyKind {
    AcceptAny,
    Pinned,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub listen_addr: String,
    pub websocket_url: Option<String>,
    pub handshake_timeout_ms: u64,
    pub keepalive_interval_secs: u64,
    pub term: String,
    pub term_width: u32,
    pub term_height: u32,
    pub host_key_policy: HostKeyPolicyKind,
    pub pinned_fingerprints: Vec<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3001".to_string(),
            websocket_url: None,
            handshake_timeout_ms: 10_000,
            keepalive_interval_secs: 30,
            term: "xterm-256color".to_string(),
            term_width: 80,
            term_height: 24,
            host_key_policy: HostKeyPolicyKind::AcceptAny,
            pinned_fingerprints: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct BridgeConfigLayer {
    pub listen_addr: Option<String>,
    pub websocket_url: Option<String>,
    pub handshake_timeout_ms: Option<u64>,
    pub keepalive_interval_secs: Option<u64>,
    pub term: Option<String>,
    pub term_width: Option<u32>,
    pub term_height: Option<u32>,
    pub host_key_policy: Option<HostKeyPolicyKind>,
    pub pinned_fingerprints: Option<Vec<String>>,
}

impl BridgeConfig {
    fn apply(&mut self, layer: BridgeConfigLayer) {
        if let Some(v) = layer.listen_addr {
            self.listen_addr = v;
        }
        if layer.websocket_url.is_some() {
            self.websocket_url = layer.websocket_url;
        }
        if let Some(v) = layer.handshake_timeout_ms {
            self.handshake_timeout_ms = v;
        }
        if let Some(v) = layer.keepalive_interval_secs {
            self.keepalive_interval_secs = v;
        }
        if let Some(v) = layer.term {
            self.term = v;
        }
        if let Some(v) = layer.term_width {
            self.term_width = v;
        }
        if let Some(v) = layer.term_height {
            self.term_height = v;
        }
        if let Some(v) = layer.host_key_policy {
            self.host_key_policy = v;
        }
        if let Some(v) = layer.pinned_fingerprints {
            self.pinned_fingerprints = v;
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    pub discovery_url: String,
    pub credential_ttl_secs: u64,
    pub default_theme: String,
    pub storage_file: Option<PathBuf>,
    /// Reported by `neo` when the terminal runs on behalf of a browser.
    pub user_agent: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            discovery_url: "http://127.0.0.1:3001/api/ssh-proxy".to_string(),
            credential_ttl_secs: 24 * 60 * 60,
            default_theme: "geist".to_string(),
            storage_file: None,
            user_agent: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct ClientConfigLayer {
    pub discovery_url: Option<String>,
    pub credential_ttl_secs: Option<u64>,
    pub default_theme: Option<String>,
    pub storage_file: Option<PathBuf>,
    pub user_agent: Option<String>,
}

impl ClientConfig {
    fn apply(&mut self, layer: ClientConfigLayer) {
        if let Some(v) = layer.discovery_url {
            self.discovery_url = v;
        }
        if let Some(v) = layer.credential_ttl_secs {
            self.credential_ttl_secs = v;
        }
        if let Some(v) = layer.default_theme {
            self.default_theme = v;
        }
        if layer.storage_file.is_some() {
            self.storage_file = layer.storage_file;
        }
        if layer.user_agent.is_some() {
            self.user_agent = layer.user_agent;
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
    pub stdout: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            stdout: true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct LoggingConfigLayer {
    pub level: Option<String>,
    pub json: Option<bool>,
    pub stdout: Option<bool>,
}

impl LoggingConfig {
    fn apply(&mut self, layer: LoggingConfigLayer) {
        if let Some(v) = layer.level {
            self.level = v;
        }
        if let Some(v) = layer.json {
            self.json = v;
        }
        if let Some(v) = layer.stdout {
            self.stdout = v;
        }
    }
}

#[derive(Clone, Debug)]
pub struct ConfigManager {
    pub paths: AppPaths,
}

impl ConfigManager {
    pub fn new(paths: AppPaths) -> Self {
        Self { paths }
    }

    pub fn load(&self, cwd: Option<&Path>, overrides: Option<AppConfigLayer>) -> Result<AppConfig> {
        self.load_with_env(cwd, overrides, std::env::var(WEBSOCKET_URL_ENV).ok())
    }

    fn load_with_env(
        &self,
        cwd: Option<&Path>,
        overrides: Option<AppConfigLayer>,
        websocket_url: Option<String>,
    ) -> Result<AppConfig> {
        let mut cfg = AppConfig::default();

        if self.paths.config_file.exists() {
            let layer = Self::load_layer(&self.paths.config_file)?;
            layer.apply_to(&mut cfg);
        }

        if let Some(dir) = cwd {
            let project_path = AppPaths::project_config_path(dir);
            if project_path.exists() {
                debug!(path = %project_path.display(), "applying project config");
                let layer = Self::load_layer(&project_path)?;
                layer.apply_to(&mut cfg);
            }
        }

        Self::apply_env(&mut cfg, websocket_url);

        if let Some(layer) = overrides {
            layer.apply_to(&mut cfg);
        }
        Ok(cfg)
    }

    fn apply_env(cfg: &mut AppConfig, websocket_url: Option<String>) {
        if let Some(url) = websocket_url.filter(|v| !v.trim().is_empty()) {
            cfg.bridge.websocket_url = Some(url);
        }
    }

    pub fn load_layer(path: &Path) -> Result<AppConfigLayer, ConfigError> {
        let content = fs::read_to_string(path)?;
        let layer: AppConfigLayer = toml::from_str(&content)?;
        Ok(layer)
    }

    pub fn save_default(&self) -> Result<()> {
        self.save_config(&AppConfig::default())
    }

    pub fn save_config(&self, cfg: &AppConfig) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(cfg).map_err(|e| anyhow::anyhow!(e))?;
        fs::write(&self.paths.config_file, content)?;
        Ok(())
    }
}
