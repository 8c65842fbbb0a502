//! mdbridge-enrich library interface
//!
//! Exposes the enrichment pipeline and the HTTP surface for integration
//! testing.

pub mod api;
pub mod auth;
pub mod config;
pub mod correlation;
pub mod db;
pub mod error;
pub mod fetch;
pub mod models;
pub mod normalize;
pub mod outcome;
pub mod parse;
pub mod pipeline;
pub mod services;
pub mod types;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::pipeline::Enricher;
use crate::services::RecordStore;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Pipeline executor
    pub enricher: Arc<Enricher>,
    /// Record store handle for status reads
    pub record_store: Arc<dyn RecordStore>,
    /// Root cancellation token; in-flight fetches abort on shutdown
    pub shutdown: CancellationToken,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        enricher: Arc<Enricher>,
        record_store: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            db,
            enricher,
            record_store,
            shutdown: CancellationToken::new(),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::enrich_routes())
        .merge(api::health_routes())
        .with_state(state)
}
