use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info, warn};

use front_door::{
    AppState, CacheBackend, Config, InMemoryUserRepository, build_router, metrics, telemetry,
    utils,
};

#[tokio::main]
async fn main() -> ExitCode {
    telemetry::init_tracing();
    telemetry::install_panic_hook();

    info!("Starting front_door v{}", env!("CARGO_PKG_VERSION"));

    match run().await {
        Ok(()) => ExitCode::from(exitcode::OK as u8),
        Err(exit_code) => ExitCode::from(exit_code as u8),
    }
}

/// Run the application, returning an exit code on error.
async fn run() -> Result<(), exitcode::ExitCode> {
    let config = Config::from_env().map_err(|e| {
        error!("Configuration error: {e}");
        exitcode::CONFIG
    })?;
    info!(
        host = %config.host,
        port = %config.port,
        debug = config.app_debug,
        "Configuration loaded"
    );

    if let Some(metrics_addr) = config.metrics_addr() {
        metrics::try_init_metrics(metrics_addr);
    }

    let cache = CacheBackend::connect(config.redis_url.as_deref())
        .await
        .map_err(|e| {
            error!("Failed to connect to cache: {e}");
            exitcode::UNAVAILABLE
        })?;
    info!(backend = cache.kind(), "Cache ready");

    if config.seed_usernames.is_empty() {
        warn!("SEED_USERNAMES is empty; every bearer token will resolve to 'User not found'");
    }
    let users = Arc::new(InMemoryUserRepository::with_usernames(
        &config.seed_usernames,
    ));

    let addr: SocketAddr = config.server_addr().parse().map_err(|e| {
        error!("Invalid server address: {e}");
        exitcode::CONFIG
    })?;

    let state = AppState::new(config, cache, users).map_err(|e| {
        error!("Failed to build application state: {e}");
        exitcode::CONFIG
    })?;
    let app = build_router(state.clone()).map_err(|e| {
        error!("Failed to build router: {e}");
        exitcode::CONFIG
    })?;

    let listener = TcpListener::bind(addr).await.map_err(|e| {
        error!("Failed to bind to {addr}: {e}");
        exitcode::UNAVAILABLE
    })?;

    info!("Server listening on http://{addr}");
    info!("API endpoints:");
    info!("  GET  /health           - Health check");
    info!("  GET  /api/v1/users/me  - Current user (Bearer)");
    info!("  GET  /openapi.json     - API description (Basic)");
    info!("  GET  /docs             - Swagger UI (Basic)");
    info!("  GET  /redoc            - ReDoc (Basic)");

    // Peer addresses feed the rate limiter's client key
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(utils::shutdown_signal())
    .await
    .map_err(|e| {
        error!("Server error: {e}");
        exitcode::SOFTWARE
    })?;

    info!("HTTP server stopped, shutting down background tasks...");
    state.shutdown().await;

    info!("Server shutdown complete");
    Ok(())
}
