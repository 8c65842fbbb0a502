//! Record store collaborator
//!
//! Persists the canonical metadata record and the per-asset enrichment
//! status, and supplies the one piece of cross-request state the
//! pipeline reads: the correlation id of the last successful run.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mdbridge_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::record::{CanonicalMetadataRecord, EnrichmentStatus, ExternalMetadataStatus};
use crate::outcome::OutcomeKind;

/// Persistence boundary for enrichment results
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Correlation id recorded by the last successful run for this asset
    async fn last_successful_correlation(&self, asset_id: Uuid) -> Result<Option<String>>;

    /// Persist the canonical record together with the correlation id that
    /// produced it
    async fn upsert_record(
        &self,
        asset_id: Uuid,
        correlation_id: &str,
        record: &CanonicalMetadataRecord,
    ) -> Result<()>;

    /// Persist the enrichment status row for this asset
    async fn upsert_status(&self, status: &ExternalMetadataStatus) -> Result<()>;

    /// Read back the stored status row, if any
    async fn load_status(&self, asset_id: Uuid) -> Result<Option<ExternalMetadataStatus>>;
}

/// SQLite-backed record store
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn last_successful_correlation(&self, asset_id: Uuid) -> Result<Option<String>> {
        let row = sqlx::query(
            "SELECT correlation_id FROM asset_metadata WHERE asset_id = ?",
        )
        .bind(asset_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.get::<String, _>("correlation_id")))
    }

    async fn upsert_record(
        &self,
        asset_id: Uuid,
        correlation_id: &str,
        record: &CanonicalMetadataRecord,
    ) -> Result<()> {
        let payload = serde_json::to_string(record)
            .map_err(|e| Error::Internal(format!("record serialization failed: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO asset_metadata (asset_id, correlation_id, record, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(asset_id) DO UPDATE SET
                correlation_id = excluded.correlation_id,
                record = excluded.record,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(asset_id.to_string())
        .bind(correlation_id)
        .bind(payload)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn upsert_status(&self, status: &ExternalMetadataStatus) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO enrichment_status (asset_id, status, outcome_kind, diagnostic, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(asset_id) DO UPDATE SET
                status = excluded.status,
                outcome_kind = excluded.outcome_kind,
                diagnostic = excluded.diagnostic,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(status.asset_id.to_string())
        .bind(status.status.as_str())
        .bind(status.outcome_kind.map(|k| k.as_str()))
        .bind(status.diagnostic.as_deref())
        .bind(status.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load_status(&self, asset_id: Uuid) -> Result<Option<ExternalMetadataStatus>> {
        let row = sqlx::query(
            "SELECT asset_id, status, outcome_kind, diagnostic, updated_at \
             FROM enrichment_status WHERE asset_id = ?",
        )
        .bind(asset_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| {
            let status = parse_status(&r.get::<String, _>("status"))?;
            let outcome_kind = r
                .get::<Option<String>, _>("outcome_kind")
                .as_deref()
                .map(parse_outcome_kind)
                .transpose()?;
            let updated_at = DateTime::parse_from_rfc3339(&r.get::<String, _>("updated_at"))
                .map_err(|e| Error::Internal(format!("stored timestamp unparseable: {}", e)))?
                .with_timezone(&Utc);

            Ok(ExternalMetadataStatus {
                asset_id,
                status,
                outcome_kind,
                diagnostic: r.get::<Option<String>, _>("diagnostic"),
                updated_at,
            })
        })
        .transpose()
    }
}

fn parse_status(raw: &str) -> Result<EnrichmentStatus> {
    match raw {
        "pending" => Ok(EnrichmentStatus::Pending),
        "success" => Ok(EnrichmentStatus::Success),
        "failed" => Ok(EnrichmentStatus::Failed),
        other => Err(Error::Internal(format!("unknown stored status '{}'", other))),
    }
}

fn parse_outcome_kind(raw: &str) -> Result<OutcomeKind> {
    match raw {
        "success" => Ok(OutcomeKind::Success),
        "no_match" => Ok(OutcomeKind::NoMatch),
        "auth_error" => Ok(OutcomeKind::AuthError),
        "error" => Ok(OutcomeKind::Error),
        other => Err(Error::Internal(format!(
            "unknown stored outcome kind '{}'",
            other
        ))),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::NamespacedIdentifier;

    async fn store() -> SqliteRecordStore {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        crate::db::init_tables(&pool).await.unwrap();
        SqliteRecordStore::new(pool)
    }

    #[tokio::test]
    async fn test_correlation_absent_before_first_success() {
        let store = store().await;
        let previous = store
            .last_successful_correlation(Uuid::new_v4())
            .await
            .unwrap();
        assert!(previous.is_none());
    }

    #[tokio::test]
    async fn test_upsert_record_persists_correlation() {
        let store = store().await;
        let asset_id = Uuid::new_v4();
        let mut record = CanonicalMetadataRecord::default();
        record.identifiers.push(NamespacedIdentifier {
            namespace: "ACME".into(),
            value: "X123".into(),
        });

        store.upsert_record(asset_id, "CORR-9", &record).await.unwrap();
        let previous = store.last_successful_correlation(asset_id).await.unwrap();
        assert_eq!(previous.as_deref(), Some("CORR-9"));

        // Re-upsert replaces, never duplicates
        store.upsert_record(asset_id, "CORR-10", &record).await.unwrap();
        let previous = store.last_successful_correlation(asset_id).await.unwrap();
        assert_eq!(previous.as_deref(), Some("CORR-10"));
    }

    #[tokio::test]
    async fn test_status_round_trip() {
        let store = store().await;
        let asset_id = Uuid::new_v4();

        let row = ExternalMetadataStatus {
            asset_id,
            status: EnrichmentStatus::Failed,
            outcome_kind: Some(OutcomeKind::NoMatch),
            diagnostic: Some("fetch: no matching record".to_string()),
            updated_at: Utc::now(),
        };
        store.upsert_status(&row).await.unwrap();

        let loaded = store.load_status(asset_id).await.unwrap().unwrap();
        assert_eq!(loaded.status, EnrichmentStatus::Failed);
        assert_eq!(loaded.outcome_kind, Some(OutcomeKind::NoMatch));
        assert_eq!(loaded.diagnostic.as_deref(), Some("fetch: no matching record"));
    }

    #[tokio::test]
    async fn test_load_status_for_unknown_asset_is_none() {
        let store = store().await;
        assert!(store.load_status(Uuid::new_v4()).await.unwrap().is_none());
    }
}
