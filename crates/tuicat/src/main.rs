use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer};
use tuicat_cli::{parse_target, Cli, Command};
use tuicat_config::{AppConfig, AppPaths, ConfigManager};
use tuicat_core::shell::{ClientEnvironment, ThemeStore};
use tuicat_core::{
    CredentialCache, FileStore, HttpLocator, KeyValueStore, LocalShell, SessionClient,
};
use tuicat_term::LoginPrefill;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut paths = AppPaths::new()?;
    if let Some(config_file) = &cli.config {
        paths.config_file = config_file.clone();
    }
    let config_manager = ConfigManager::new(paths.clone());
    let config = config_manager.load(std::env::current_dir().ok().as_deref(), Some(cli.overrides()))?;
    let interactive = cli.is_interactive();
    let _log_guard = init_logging(&config, &paths, config.logging.stdout && !interactive)?;

    match cli.command {
        Some(Command::Config { init }) => {
            if init {
                config_manager.save_default()?;
                println!("config initialized at {}", paths.config_file.display());
            }
        }
        Some(Command::Bridge { .. }) => {
            info!(listen = %config.bridge.listen_addr, "starting bridge");
            tuicat_bridge::serve(config.bridge).await?;
        }
        Some(Command::Connect { target, identity }) => {
            let target = parse_target(&target)?;
            let prefill = LoginPrefill {
                host: target.host,
                username: target.username,
                port: Some(target.port),
                identity,
            };
            run_terminal(&config, &paths, Some(prefill)).await?;
        }
        None => {
            run_terminal(&config, &paths, None).await?;
        }
    }

    Ok(())
}

async fn run_terminal(
    config: &AppConfig,
    paths: &AppPaths,
    prefill: Option<LoginPrefill>,
) -> Result<()> {
    let storage_file = config
        .client
        .storage_file
        .clone()
        .unwrap_or_else(|| paths.storage_file.clone());
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(storage_file));
    let ttl = chrono::Duration::seconds(config.client.credential_ttl_secs as i64);
    let cache = CredentialCache::with_ttl(store.clone(), ttl);
    let themes = ThemeStore::load(store, &config.client.default_theme);
    let environment = ClientEnvironment::detect().with_user_agent(config.client.user_agent.clone());
    let shell = LocalShell::new(themes, environment);
    let locator = HttpLocator::new(config.client.discovery_url.clone());
    let client = SessionClient::new(Arc::new(locator), cache);
    tuicat_term::run(shell, client, prefill).await
}

/// Daily-rolling file log always; stdout only when nothing else owns the screen.
fn init_logging(
    config: &AppConfig,
    paths: &AppPaths,
    enable_stdout: bool,
) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    std::fs::create_dir_all(&paths.log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&paths.log_dir, "tuicat.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let json = config.logging.json;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer(non_blocking, json, false))
        .with(enable_stdout.then(|| fmt_layer(std::io::stdout, json, true)))
        .try_init()?;

    Ok(guard)
}

fn fmt_layer<S, W>(writer: W, json: bool, ansi: bool) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a> + 'static,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(true);
    if json {
        layer.json().boxed()
    } else {
        layer.boxed()
    }
}
