use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use grabbit_core::{load_config, CancelHandle, TorrentService};
use grabbit_server::{api::create_router, state::AppState};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    let log_json = std::env::var("GRABBIT_LOG_JSON")
        .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
        .unwrap_or(false);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(log_json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!log_json).then(tracing_subscriber::fmt::layer))
        .init();

    info!("Starting grabbit-server v{}", VERSION);

    // Determine config path
    let config_path = std::env::var("GRABBIT_CONFIG").ok().map(PathBuf::from);

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(config_path.as_deref())
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    info!("qBittorrent WebUI at {}", config.qbittorrent.base_url());
    info!(
        "API key guard: {}",
        if config.server.api_key.is_some() { "enabled" } else { "disabled" }
    );

    let addr = SocketAddr::new(config.server.host, config.server.port);

    let service = TorrentService::connect(config).context("Failed to create qBittorrent client")?;
    match service.build_info().await {
        Ok(build) => info!(
            "Connected to qBittorrent {} (WebUI API {})",
            build.app_version, build.web_api_version
        ),
        Err(e) => tracing::warn!("qBittorrent not reachable yet: {}", e),
    }

    // Shutdown cancels in-flight search waits
    let (shutdown, token) = CancelHandle::new();
    let state = Arc::new(AppState::new(service, token));

    // Create router
    let app = create_router(state);

    // Start server
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("Server shutting down...");
            shutdown.cancel();
        })
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
