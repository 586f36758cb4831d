use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cotizalink::config::Config;
use cotizalink::storage::PdfStorage;
use cotizalink::AppState;

#[derive(Parser, Debug)]
#[command(name = "cotizalink")]
#[command(author, version, about = "Tracked quote-link server", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "cotizalink.toml")]
    config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config)?;

    // Initialize logging
    let log_level = cli
        .log_level
        .as_ref()
        .unwrap_or(&config.logging.level)
        .clone();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Cotizalink v{}", env!("CARGO_PKG_VERSION"));

    // Ensure data directory exists
    std::fs::create_dir_all(&config.server.data_dir)?;

    // Initialize database
    let db = cotizalink::db::init(&config.server.data_dir).await?;

    // Ensure bootstrap admin user exists
    cotizalink::api::auth::ensure_admin_user(&db, &config.auth).await?;

    // Blob storage for PDFs and avatars
    let storage = PdfStorage::new(&config.server.data_dir, &config.storage.public_base_url)?;

    // Webhook notification worker, decoupled from request handling
    let (notify_tx, notify_rx) = mpsc::channel(100);
    cotizalink::notifications::spawn_webhook_worker(notify_rx, config.webhook.clone());

    // Create app state
    let state = Arc::new(AppState::new(config.clone(), db, storage, notify_tx));

    // Periodic pruning of stale lockout entries
    cotizalink::api::lockout::spawn_cleanup_task(state.lockout.clone(), 300);

    let app = cotizalink::api::create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("API server listening on http://{}", addr);
    tracing::info!("Public links served from {}", config.storage.public_base_url);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
