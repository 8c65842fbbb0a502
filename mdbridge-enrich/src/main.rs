//! mdbridge-enrich - External Metadata Enrichment Microservice
//!
//! Fetches metadata about media assets from an external source-of-record
//! system (MAM/DAM), normalizes it into canonical records, and serves the
//! trigger API the orchestrating workflow calls.

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use mdbridge_enrich::config::ServiceConfig;
use mdbridge_enrich::pipeline::Enricher;
use mdbridge_enrich::services::{FileSecretStore, SqliteRecordStore};
use mdbridge_enrich::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let service_config = ServiceConfig::resolve();

    // Initialize tracing
    let level = match service_config.log_level.as_str() {
        "error" => Level::ERROR,
        "warn" => Level::WARN,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting mdbridge-enrich (External Metadata Enrichment) microservice");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Data folder: {}", service_config.data_folder.display());

    mdbridge_common::config::ensure_directory_exists(&service_config.data_folder)
        .map_err(|e| anyhow::anyhow!("Failed to initialize data folder: {}", e))?;

    // Open or create the service database
    let db_path = service_config.database_path();
    info!("Database: {}", db_path.display());
    let db_pool = mdbridge_enrich::db::init_database_pool(&db_path).await?;
    info!("Database connection established");

    // Shared HTTP client for metadata, token, and config fetches
    let http_client = reqwest::Client::builder()
        .user_agent(concat!("mdbridge-enrich/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let record_store = Arc::new(SqliteRecordStore::new(db_pool.clone()));
    let secret_store = Arc::new(FileSecretStore::new(service_config.secrets_folder.clone()));
    let enricher = Arc::new(Enricher::new(http_client, secret_store, record_store.clone()));

    let state = AppState::new(db_pool, enricher, record_store);
    let shutdown = state.shutdown.clone();
    let app = mdbridge_enrich::build_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&service_config.bind_address).await?;
    info!("Listening on http://{}", service_config.bind_address);
    info!("Health check: http://{}/health", service_config.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received, cancelling in-flight work");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}
