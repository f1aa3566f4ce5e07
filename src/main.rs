//! # syncdoc
//!
//! Shared-document server binary: loads settings, installs logging and
//! metrics, seeds the store, and serves until Ctrl-C.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use syncdoc_server::config::ServerConfig;
use syncdoc_server::metrics::install_recorder;
use syncdoc_server::server::SyncServer;
use syncdoc_settings::loader::{load_settings_from_path, settings_path};
use syncdoc_store::DocumentStore;
use syncdoc_telemetry::{init_telemetry, TelemetryConfig};

/// Real-time shared JSON document server.
#[derive(Parser, Debug)]
#[command(name = "syncdoc", about = "Real-time shared JSON document server")]
struct Cli {
    /// Settings file (defaults to `~/.syncdoc/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Default log level when `RUST_LOG` is unset (overrides settings).
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON log lines.
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let path = cli.config.clone().unwrap_or_else(settings_path);
    let mut settings = load_settings_from_path(&path)
        .with_context(|| format!("failed to load settings from {}", path.display()))?;
    if let Some(host) = cli.host {
        settings.server.host = host;
    }
    if let Some(port) = cli.port {
        settings.server.port = port;
    }
    if let Some(level) = cli.log_level {
        settings.logging.level = level;
    }
    settings.logging.json |= cli.log_json;

    init_telemetry(&TelemetryConfig::from_level_name(
        &settings.logging.level,
        settings.logging.json,
    ))?;
    let metrics = install_recorder().context("failed to install metrics recorder")?;

    let store = Arc::new(DocumentStore::new());
    store.seed(settings.documents.seed.clone());
    tracing::info!(documents = store.len(), "document store seeded");

    let server = SyncServer::new(ServerConfig::from(&settings), store).with_metrics(metrics);
    let (addr, handle) = server
        .listen()
        .await
        .with_context(|| {
            format!(
                "failed to bind {}:{}",
                settings.server.host, settings.server.port
            )
        })?;
    tracing::info!(%addr, "syncdoc ready");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("shutdown signal received");
    server.shutdown().graceful_shutdown(vec![handle], None).await;
    tracing::info!("syncdoc stopped");
    Ok(())
}
