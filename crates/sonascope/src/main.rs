//! sonascope - Sonata-form analysis service
//!
//! Accepts MIDI uploads over HTTP and returns a structural segmentation
//! with per-section confidence and key labels.

use anyhow::{Context, Result};
use clap::Parser;
use sonascope::AppState;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// The Sonascope analysis server
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a config file (overrides discovery)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config =
        sonascope::config::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(port) = cli.port {
        config.bind.http_port = port;
    }

    tracing::info!("Starting sonascope v{}", env!("CARGO_PKG_VERSION"));
    match &config.enhance {
        Some(enhance) if !enhance.endpoint.is_empty() => {
            tracing::info!(endpoint = %enhance.endpoint, "enhancement backend configured");
        }
        _ => tracing::info!("no enhancement backend configured, serving core results only"),
    }

    let state = AppState::from_config(&config);
    let app = sonascope::router(state);

    let addr = format!("127.0.0.1:{}", config.bind.http_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("Listening on http://{}", addr);
    tracing::info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
