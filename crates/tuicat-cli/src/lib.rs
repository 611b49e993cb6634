use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tuicat_config::{AppConfigLayer, BridgeConfigLayer, ClientConfigLayer};

#[derive(Parser, Debug)]
#[command(name = "tuicat", version, about = "tuicat terminal and SSH bridge")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Use this config file instead of the per-user one.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true)]
    pub discovery_url: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the WebSocket to SSH bridge.
    Bridge {
        #[arg(long)]
        listen: Option<String>,
        #[arg(long)]
        websocket_url: Option<String>,
    },
    /// Open the terminal on the login form for `user@host[:port]`.
    Connect {
        target: String,
        #[arg(long)]
        identity: Option<PathBuf>,
    },
    Config {
        #[arg(long)]
        init: bool,
    },
}

impl Cli {
    /// Command-line values as the last file-independent config layer.
    pub fn overrides(&self) -> AppConfigLayer {
        let mut layer = AppConfigLayer::default();
        if let Some(url) = &self.discovery_url {
            layer.client = Some(ClientConfigLayer {
                discovery_url: Some(url.clone()),
                ..Default::default()
            });
        }
        if let Some(Command::Bridge {
            listen,
            websocket_url,
        }) = &self.command
        {
            layer.bridge = Some(BridgeConfigLayer {
                listen_addr: listen.clone(),
                websocket_url: websocket_url.clone(),
                ..Default::default()
            });
        }
        layer
    }

    pub fn is_interactive(&self) -> bool {
        matches!(self.command, None | Some(Command::Connect { .. }))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectTarget {
    pub username: String,
    pub host: String,
    pub port: u16,
}

/// Parses `[user@]host[:port]`. The user defaults to the local account.
pub fn parse_target(target: &str) -> Result<ConnectTarget> {
    let (username, rest) = match target.rsplit_once('@') {
        Some((user, rest)) => (user.to_string(), rest),
        None => (whoami::username(), target),
    };
    let (host, port) = match rest.rsplit_once(':') {
        Some((host, port)) => match port.parse::<u16>() {
            Ok(port) if port > 0 => (host, port),
            _ => bail!("invalid port in {}", target),
        },
        None => (rest, 22),
    };
    if host.is_empty() || username.is_empty() {
        bail!("expected user@host[:port], got {}", target);
    }
    Ok(ConnectTarget {
        username,
        host: host.to_string(),
        port,
    })
}
