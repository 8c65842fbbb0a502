//! Enrichment pipeline
//!
//! Composes the stages for one asset in strict sequence (resolve,
//! authenticate, fetch, parse, normalize, classify), short-circuiting
//! on the first stage failure. Batch requests fan out into independent
//! tasks; one asset's failure never affects another's outcome.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::AuthProvider;
use crate::correlation;
use crate::fetch::MetadataFetcher;
use crate::models::record::{CanonicalMetadataRecord, EnrichmentStatus, ExternalMetadataStatus};
use crate::normalize;
use crate::outcome::{classify, EnrichmentOutcome};
use crate::parse;
use crate::services::{RecordStore, SecretStore};
use crate::types::{AuthError, EnrichmentRequest, StageError};

/// Maximum assets accepted in one trigger batch
pub const MAX_BATCH_SIZE: usize = 50;

/// Pipeline executor
///
/// Stateless across requests apart from the shared HTTP client and the
/// collaborator handles; safe to run concurrently for different assets.
pub struct Enricher {
    http_client: reqwest::Client,
    auth: AuthProvider,
    secrets: Arc<dyn SecretStore>,
    store: Arc<dyn RecordStore>,
}

impl Enricher {
    pub fn new(
        http_client: reqwest::Client,
        secrets: Arc<dyn SecretStore>,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            auth: AuthProvider::new(http_client.clone()),
            http_client,
            secrets,
            store,
        }
    }

    /// Run the full pipeline for one asset and persist the outcome
    pub async fn enrich_asset(
        &self,
        request: EnrichmentRequest,
        cancel: CancellationToken,
    ) -> EnrichmentOutcome {
        let asset_id = request.asset_id;

        if let Err(e) = self
            .store
            .upsert_status(&ExternalMetadataStatus::pending(asset_id))
            .await
        {
            error!(asset_id = %asset_id, error = %e, "Could not record pending status");
            return EnrichmentOutcome::Error {
                diagnostic: format!("internal: status write failed: {}", e),
            };
        }

        let result = self.run_stages(&request, &cancel).await;
        let correlation_id = result.as_ref().ok().map(|(_, id)| id.clone());
        let outcome = classify(result.map(|(record, _)| record));

        match self.persist_outcome(asset_id, &outcome, correlation_id).await {
            Ok(()) => outcome,
            Err(e) => {
                error!(asset_id = %asset_id, error = %e, "Could not persist outcome");
                EnrichmentOutcome::Error {
                    diagnostic: format!("internal: outcome persistence failed: {}", e),
                }
            }
        }
    }

    /// Process a batch of independent requests concurrently
    ///
    /// Each asset runs in its own task with a child cancellation token;
    /// a panic in one task surfaces as that asset's Error outcome only.
    pub async fn enrich_batch(
        self: Arc<Self>,
        requests: Vec<EnrichmentRequest>,
        cancel: &CancellationToken,
    ) -> Vec<(Uuid, EnrichmentOutcome)> {
        let handles: Vec<_> = requests
            .into_iter()
            .map(|request| {
                let enricher = Arc::clone(&self);
                let asset_id = request.asset_id;
                let child_cancel = cancel.child_token();
                let handle = tokio::spawn(async move {
                    enricher.enrich_asset(request, child_cancel).await
                });
                (asset_id, handle)
            })
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for (asset_id, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(asset_id = %asset_id, error = %e, "Enrichment task failed");
                    EnrichmentOutcome::Error {
                        diagnostic: format!("internal: enrichment task failed: {}", e),
                    }
                }
            };
            outcomes.push((asset_id, outcome));
        }
        outcomes
    }

    /// The short-circuiting stage sequence
    ///
    /// Returns the normalized record together with the correlation id
    /// that produced it, so a success can be made durable for future
    /// runs.
    async fn run_stages(
        &self,
        request: &EnrichmentRequest,
        cancel: &CancellationToken,
    ) -> Result<(CanonicalMetadataRecord, String), StageError> {
        // The one piece of cross-request state: the last successful
        // correlation, read here and injected into the pure resolver
        let previous = self
            .store
            .last_successful_correlation(request.asset_id)
            .await
            .map_err(|e| StageError::Internal(format!("correlation lookup failed: {}", e)))?;

        let decision = correlation::resolve(
            request.correlation_override.as_deref(),
            previous.as_deref(),
            &request.filename,
        );
        info!(
            asset_id = %request.asset_id,
            correlation_id = %decision.resolved_id,
            origin = ?decision.origin,
            "Correlation resolved"
        );

        let credentials = self
            .secrets
            .get(&request.source.secret_reference)
            .await
            .map_err(|e| match e {
                mdbridge_common::Error::NotFound(msg) | mdbridge_common::Error::Config(msg) => {
                    StageError::Auth(AuthError::IncompleteCredentials(msg))
                }
                other => StageError::Internal(format!("secret store failed: {}", other)),
            })?;

        let mut auth_context = self
            .auth
            .authenticate(
                request.source.auth_type,
                &credentials,
                request.source.token_endpoint.as_deref(),
            )
            .await?;

        // Token-based contexts are re-validated before use; a context is
        // never attached to a request past its expiry
        if auth_context.is_expired() {
            warn!(asset_id = %request.asset_id, "Auth context expired before use, re-authenticating");
            auth_context = self
                .auth
                .authenticate(
                    request.source.auth_type,
                    &credentials,
                    request.source.token_endpoint.as_deref(),
                )
                .await?;
        }

        let fetcher = MetadataFetcher::new(self.http_client.clone(), request.source.retry.clone());
        let body = fetcher
            .fetch(
                &request.source.metadata_endpoint,
                &auth_context,
                &decision.resolved_id,
                &request.source.correlation_param,
                cancel,
            )
            .await?;

        let tree = parse::parse(&body, request.source.response_format)?;

        let config = normalize::config::load(&request.normalization, &self.http_client).await?;
        let record = normalize::normalize(&tree, &config, &body)?;

        Ok((record, decision.resolved_id))
    }

    /// Persist the classified outcome: the record on Success, a failed
    /// status row with the outcome kind otherwise
    async fn persist_outcome(
        &self,
        asset_id: Uuid,
        outcome: &EnrichmentOutcome,
        correlation_id: Option<String>,
    ) -> mdbridge_common::Result<()> {
        match outcome {
            EnrichmentOutcome::Success(record) => {
                let correlation_id = correlation_id.unwrap_or_default();
                self.store
                    .upsert_record(asset_id, &correlation_id, record)
                    .await?;
                self.store
                    .upsert_status(&ExternalMetadataStatus {
                        asset_id,
                        status: EnrichmentStatus::Success,
                        outcome_kind: Some(outcome.kind()),
                        diagnostic: None,
                        updated_at: chrono::Utc::now(),
                    })
                    .await?;
                info!(asset_id = %asset_id, "Enrichment succeeded");
            }
            _ => {
                self.store
                    .upsert_status(&ExternalMetadataStatus {
                        asset_id,
                        status: EnrichmentStatus::Failed,
                        outcome_kind: Some(outcome.kind()),
                        diagnostic: outcome.diagnostic().map(String::from),
                        updated_at: chrono::Utc::now(),
                    })
                    .await?;
                warn!(
                    asset_id = %asset_id,
                    kind = outcome.kind().as_str(),
                    diagnostic = outcome.diagnostic().unwrap_or(""),
                    "Enrichment did not produce a record"
                );
            }
        }
        Ok(())
    }
}
