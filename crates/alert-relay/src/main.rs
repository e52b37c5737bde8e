//! alert-relay server binary.
//!
//! Loads the routing config, then serves Alertmanager webhooks until SIGINT
//! or SIGTERM.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use alert_relay::{server, Config, NotificationPipeline};

/// Alertmanager webhook receiver that forwards alerts to Discord, Slack and Telegram
#[derive(Parser)]
#[command(name = "alert-relay")]
#[command(version)]
struct Cli {
    /// Path to the routing config (YAML)
    #[arg(short, long, env = "ALERT_RELAY_CONFIG", default_value = "config.yml")]
    config: PathBuf,

    /// Host to bind to
    #[arg(short = 'H', long, env = "ALERT_RELAY_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, env = "ALERT_RELAY_PORT", default_value = "8090")]
    port: u16,

    /// Timeout for each outbound platform request, in seconds
    #[arg(long, env = "ALERT_RELAY_TIMEOUT_SECS", default_value = "10")]
    timeout_secs: u64,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, env = "ALERT_RELAY_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let config = Config::load(&cli.config)
        .await
        .with_context(|| format!("invalid config {}", cli.config.display()))?;

    let pipeline = NotificationPipeline::new(Arc::new(config), Duration::from_secs(cli.timeout_secs))
        .context("failed to build platform clients")?;
    let router = server::build_router(Arc::new(pipeline));

    let listener = tokio::net::TcpListener::bind((cli.host.as_str(), cli.port))
        .await
        .with_context(|| format!("failed to bind {}:{}", cli.host, cli.port))?;
    let addr: SocketAddr = listener.local_addr()?;

    info!(%addr, "alert-relay listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("alert-relay stopped");
    Ok(())
}

fn init_tracing(verbose: bool, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("alert_relay=debug,tower_http=debug,info")
        } else {
            EnvFilter::new("alert_relay=info,warn")
        }
    });

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
