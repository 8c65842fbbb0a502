//! Enrichment trigger API handlers
//!
//! POST /enrich (batch trigger, max 50 assets), GET /enrich/:asset_id/status

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::record::ExternalMetadataStatus;
use crate::normalize::config::NormalizationConfigRef;
use crate::outcome::OutcomeKind;
use crate::pipeline::MAX_BATCH_SIZE;
use crate::types::{EnrichmentRequest, SourceSystemParams};
use crate::AppState;

/// One asset in a trigger batch
#[derive(Debug, Deserialize)]
pub struct TriggerItem {
    pub asset_id: Uuid,
    #[serde(default)]
    pub filename: Option<String>,
    /// Per-item parameters from the orchestrating workflow
    #[serde(default)]
    pub params: TriggerItemParams,
}

/// Per-item pipeline parameters
#[derive(Debug, Default, Deserialize)]
pub struct TriggerItemParams {
    /// Manual correlation override; always wins when present
    #[serde(default)]
    pub correlation_id: Option<String>,
}

/// POST /enrich request
#[derive(Debug, Deserialize)]
pub struct TriggerRequest {
    /// Source-system connection parameters shared by the batch
    pub source: SourceSystemParams,
    /// Normalization config (inline, remote, or both)
    #[serde(default)]
    pub normalization: NormalizationConfigRef,
    pub items: Vec<TriggerItem>,
}

/// Per-asset result in the trigger response
#[derive(Debug, Serialize)]
pub struct AssetOutcomeSummary {
    pub asset_id: Uuid,
    pub outcome: OutcomeKind,
    /// Whether the orchestrating caller may retry the pipeline
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

/// POST /enrich response
#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub results: Vec<AssetOutcomeSummary>,
}

/// POST /enrich
///
/// Runs the enrichment pipeline for each asset in the batch. Assets are
/// processed independently; the response carries one classified outcome
/// per asset, in request order.
pub async fn trigger_enrichment(
    State(state): State<AppState>,
    Json(request): Json<TriggerRequest>,
) -> ApiResult<Json<TriggerResponse>> {
    if request.items.is_empty() {
        return Err(ApiError::BadRequest("batch contains no items".to_string()));
    }
    if request.items.len() > MAX_BATCH_SIZE {
        return Err(ApiError::BadRequest(format!(
            "batch size {} exceeds the maximum of {}",
            request.items.len(),
            MAX_BATCH_SIZE
        )));
    }

    let mut requests = Vec::with_capacity(request.items.len());
    for item in &request.items {
        let filename = item.filename.clone().unwrap_or_default();
        let has_override = item
            .params
            .correlation_id
            .as_deref()
            .is_some_and(|id| !id.trim().is_empty());
        // The resolver never fails; supplying neither a filename nor an
        // override is a caller contract violation caught here
        if filename.trim().is_empty() && !has_override {
            return Err(ApiError::BadRequest(format!(
                "asset {}: neither filename nor correlation override supplied",
                item.asset_id
            )));
        }

        requests.push(EnrichmentRequest {
            asset_id: item.asset_id,
            filename,
            correlation_override: item.params.correlation_id.clone(),
            source: request.source.clone(),
            normalization: request.normalization.clone(),
        });
    }

    tracing::info!(batch_size = requests.len(), "Enrichment batch triggered");

    let outcomes = state
        .enricher
        .clone()
        .enrich_batch(requests, &state.shutdown)
        .await;

    // Keep the most recent operational fault visible on /health
    if let Some((asset_id, outcome)) = outcomes
        .iter()
        .find(|(_, outcome)| outcome.kind() == OutcomeKind::Error)
    {
        let mut last_error = state.last_error.write().await;
        *last_error = Some(format!(
            "asset {}: {}",
            asset_id,
            outcome.diagnostic().unwrap_or("unknown error")
        ));
    }

    let results = outcomes
        .into_iter()
        .map(|(asset_id, outcome)| AssetOutcomeSummary {
            asset_id,
            outcome: outcome.kind(),
            retryable: outcome.is_retryable(),
            diagnostic: outcome.diagnostic().map(String::from),
        })
        .collect();

    Ok(Json(TriggerResponse { results }))
}

/// GET /enrich/:asset_id/status
///
/// Reads back the stored enrichment status row for an asset.
pub async fn enrichment_status(
    State(state): State<AppState>,
    Path(asset_id): Path<Uuid>,
) -> ApiResult<Json<ExternalMetadataStatus>> {
    let status = state
        .record_store
        .load_status(asset_id)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!("no enrichment status for asset {}", asset_id))
        })?;
    Ok(Json(status))
}

/// Build enrichment routes
pub fn enrich_routes() -> Router<AppState> {
    Router::new()
        .route("/enrich", post(trigger_enrichment))
        .route("/enrich/:asset_id/status", get(enrichment_status))
}
