//! Database access for mdbridge-enrich
//!
//! SQLite storage for canonical records, enrichment status rows, and the
//! last successful correlation id per asset.

use anyhow::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
///
/// Connects to the service database inside the data folder, creating the
/// file and tables when missing.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Use proper SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// Initialize mdbridge-enrich specific tables
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    // Canonical records, one row per asset, JSON payload
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS asset_metadata (
            asset_id TEXT PRIMARY KEY,
            correlation_id TEXT NOT NULL,
            record TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Enrichment status, one row per attempted asset
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS enrichment_status (
            asset_id TEXT PRIMARY KEY,
            status TEXT NOT NULL,
            outcome_kind TEXT,
            diagnostic TEXT,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (asset_metadata, enrichment_status)");
    Ok(())
}
