use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use panel_relay::web::{run_server, ServerConfig, WebAppState};
use panel_relay::{util, Config, HttpUpstream, RelayCore};

/// Bridge OpenCode event streams into webview panels.
#[derive(Debug, Parser)]
#[command(name = "panel-relay", version, about)]
struct Cli {
    /// Address to bind the panel server to
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(long)]
    port: Option<u16>,

    /// Base URL of the OpenCode backend
    #[arg(long)]
    backend_url: Option<String>,

    /// Working directory the backend serves
    #[arg(long)]
    directory: Option<PathBuf>,

    /// Data directory (defaults to ~/.panel-relay)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Disable the background session activity monitor
    #[arg(long)]
    no_monitor: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    util::init_data_dir(cli.data_dir.clone());

    // Initialize logging to file (~/.panel-relay/logs/panel-relay.log)
    fs::create_dir_all(util::logs_dir())?;

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(util::log_file_path())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(log_file)
        .with_ansi(false) // Disable ANSI colors in log file
        .init();

    let mut config = Config::load();
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(url) = cli.backend_url {
        config = config.with_backend_url(url);
    }
    if let Some(dir) = cli.directory {
        config = config.with_working_dir(dir);
    }
    if cli.no_monitor {
        config.monitor.enabled = false;
    }

    let server_config = ServerConfig::from(&config);
    let upstream = Arc::new(HttpUpstream::new()?);
    let core = RelayCore::new(config, upstream);

    run_server(WebAppState::new(core), server_config).await
}
