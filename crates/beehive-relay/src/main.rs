//! # beehive-relay
//!
//! Relay server binary: loads settings, installs logging and metrics, and
//! serves the game relay until Ctrl-C.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use beehive_server::config::ServerConfig;
use beehive_server::server::RelayServer;
use beehive_settings::loader::parse_log_level;
use beehive_settings::{RelaySettings, load_settings_from_path, settings_path};
use clap::Parser;

/// Real-time relay for the multiplayer word game.
#[derive(Parser, Debug)]
#[command(name = "beehive-relay", about = "Multiplayer word game relay server")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Path to a JSON settings file.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log level: trace, debug, info, warn or error (overrides settings).
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Layer command-line flags over loaded settings.
    fn apply(&self, settings: &mut RelaySettings) -> Result<()> {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(level) = &self.log_level {
            settings.logging.level = parse_log_level(level)
                .with_context(|| format!("invalid --log-level '{level}'"))?;
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let path = args.settings.clone().unwrap_or_else(settings_path);
    let bootstrap = beehive_core::logging::bootstrap_subscriber(std::io::stderr);
    let mut settings = tracing::subscriber::with_default(bootstrap, || load_settings_from_path(&path))
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    args.apply(&mut settings)?;

    beehive_core::logging::init_subscriber(settings.logging.level.as_filter_str());

    let metrics = beehive_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;

    let config = ServerConfig::from(&settings.server);
    let server = RelayServer::new(config).with_metrics(metrics);
    let (addr, handle) = server
        .listen()
        .await
        .context("Failed to bind server")?;

    tracing::info!("beehive relay listening on ws://{addr}/ws");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    server.shutdown().graceful_shutdown(vec![handle], None).await;

    tracing::info!(rooms = server.registry().len(), "Shutdown complete");
    Ok(())
}
