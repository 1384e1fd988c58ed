//! Textlift Server
//!
//! A self-hosted image to text converter: upload an image or point at a URL,
//! pick a language, and follow the recognition progress.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use textlift_server::config::Config;
use textlift_server::routes;
use textlift_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "textlift_server=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    let config = Config::from_env().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from env: {}, using defaults", e);
        Config::default()
    });

    tracing::info!("Starting Textlift Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("OCR engines: {:?}", config.ocr.engines);
    tracing::info!("Default language: {}", config.ocr.default_language);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid SERVER_HOST/SERVER_PORT")?;
    let cleanup_every = Duration::from_secs(config.sessions.cleanup_interval_secs.max(1));

    // Create application state
    let app_state = AppState::new(config);

    let available = app_state.available_engines().await;
    if available.is_empty() {
        tracing::warn!("No OCR engine is reachable yet; conversions will fail until one is");
    } else {
        tracing::info!("Available OCR engines: {:?}", available);
    }

    let cleanup = app_state.sessions().clone().start_cleanup_task(cleanup_every);

    let app = routes::app(app_state);

    // Start server with graceful shutdown
    tracing::info!("Textlift Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    cleanup.abort();
    tracing::info!("Server shutdown complete");

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
