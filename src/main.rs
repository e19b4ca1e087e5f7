//! # statebus
//!
//! State bus server binary: resolves settings, starts logging, and serves
//! the bus until Ctrl-C.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use statebus_core::SubscriptionRouter;
use statebus_core::logging::{init_json_subscriber, init_subscriber};
use statebus_server::{BusServer, ServerConfig};
use statebus_settings::{BusSettings, LogFormat};

/// Real-time state synchronization bus.
#[derive(Parser, Debug)]
#[command(name = "statebus", about = "Real-time state synchronization bus")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// WebSocket endpoint path (overrides settings).
    #[arg(long)]
    path: Option<String>,

    /// Settings file (default `~/.statebus/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log filter directive, e.g. `debug` or `statebus_server=trace`.
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Resolve settings: defaults, then file, then env, then flags.
    fn settings(&self) -> Result<BusSettings> {
        let path = self
            .config
            .clone()
            .unwrap_or_else(statebus_settings::settings_path);
        let mut settings = statebus_settings::load_settings_from_path(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?;

        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(ws_path) = &self.path {
            settings.server.ws_path.clone_from(ws_path);
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }

        statebus_settings::validate(&settings).context("Invalid command-line override")?;
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let settings = args.settings()?;

    match settings.logging.format {
        LogFormat::Compact => init_subscriber(&settings.logging.level),
        LogFormat::Json => init_json_subscriber(&settings.logging.level),
    }

    let config = ServerConfig::from(&settings.server);
    let shutdown_timeout = config.shutdown_timeout;
    let server = BusServer::new(config, SubscriptionRouter::new());
    let (addr, handle) = server
        .listen()
        .await
        .context("Failed to start server")?;

    tracing::info!(
        "statebus listening on ws://{addr}{}",
        server.config().ws_path
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    server
        .shutdown()
        .graceful_shutdown(vec![handle], shutdown_timeout)
        .await;

    tracing::info!("Shutdown complete");
    Ok(())
}
