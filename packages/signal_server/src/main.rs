use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

use signal_server::config::{CliOverrides, FileConfig, ServerConfig, load_config};
use signal_server::{AppState, router};

#[derive(Parser, Debug)]
#[command(name = "signal-server")]
#[command(about = "WebSocket rendezvous and signaling relay for WebRTC peers")]
struct Cli {
    /// Path to a TOML config file (default: ./signal-server.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to bind to
    #[arg(short = 'b', long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let default_directive = if cli.debug {
        "signal_server=debug,rendezvous=debug,tower_http=debug,info"
    } else {
        "signal_server=info,rendezvous=info,tower_http=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();

    let mut file_config: FileConfig = load_config(cli.config.as_deref())
        .extract()
        .context("Failed to load configuration")?;
    CliOverrides {
        host: cli.host,
        port: cli.port,
    }
    .apply(&mut file_config);
    let config = ServerConfig::from_file(&file_config)?;

    info!("Starting signal server");

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;
    let actual_addr = listener.local_addr()?;

    info!("Signal server listening on http://{}", actual_addr);
    info!("  GET /ws          - signaling WebSocket");
    info!("  GET /health      - health and pairing counts");
    info!("  GET /metrics     - server metrics");

    let app = router(AppState::new(config));

    let shutdown_signal = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received shutdown signal, closing listener..."),
            Err(e) => {
                warn!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("Server error")?;

    info!("Signal server stopped");
    Ok(())
}
