//! # Ad Mediation HTTP Server
//!
//! Serves per (country, ad type) priority lists of ad networks to mobile
//! clients and accepts replacement updates for them.
//!
//! ## Key Features:
//! - **PostgreSQL Integration**: Pooled connections through `deadpool_postgres`;
//!   every update is a single read-committed transaction.
//! - **HTTP API**:
//!   - `GET /api/v1/ad-networks` returns the filtered network sequence for a
//!     client context (platform, OS version, app).
//!   - `POST /api/v1/ad-networks/{country_code}/{ad_type}` replaces one list.
//!   - `GET /api/v1/dashboard` returns every list grouped for display.
//!   - `GET /health` for liveness probes.
//! - **Bounded Requests**: storage-backed requests fail with `504` after the
//!   configured timeout instead of hanging.
//! - **Configurable**: `.env`, environment variables and CLI arguments via `clap`.
//! - **Structured Logging**: `tracing` to the console and, optionally, a log file.

use std::net::SocketAddr;
use std::sync::Arc;

use lib_mediation::MediationService;
use lib_mediation::configs::config_app::AppConfig;
use lib_mediation::connections::db_postgres::{PgPriorityStore, create_pool};
use lib_mediation::loggers::logsetup::setup_logging;
use tokio::signal;
use tracing::info;

mod mediation_logic;
use mediation_logic::routes;

const APP_NAME: &str = "server_mediation";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    // Keeps the file writer flushing until main returns.
    let _log_guard = setup_logging(APP_NAME, config.log_dir.as_deref(), &config.log_level)?;
    info!("Configuration loaded:\n{}", config);

    let pool = create_pool(&config.postgres_settings())?;
    let store = PgPriorityStore::new(pool);
    store.ping().await?;
    info!("Connected to Postgres!");
    store.ensure_schema().await?;

    let service = Arc::new(MediationService::new(
        Arc::new(store),
        config.request_timeout(),
    ));
    let app = routes::router(service);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.app_port));
    info!("Starting HTTP server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutdown complete.");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term_signal) => {
                term_signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Ctrl-C received, initiating shutdown."),
        _ = terminate => info!("SIGTERM received, initiating shutdown."),
    }
}
