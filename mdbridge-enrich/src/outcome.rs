//! Outcome classification
//!
//! Maps the result of the pipeline stages onto exactly one of four
//! terminal outcomes. Classification is one-shot per request; retrying
//! belongs to the orchestrating caller, which may re-invoke the pipeline
//! for `AuthError`/`Error` but must not automatically retry `NoMatch`,
//! which signals a data problem (wrong correlation id), not a transient
//! fault.

use serde::{Deserialize, Serialize};

use crate::models::record::CanonicalMetadataRecord;
use crate::types::{FetchError, StageError};

/// Terminal outcome kind, as persisted and reported to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Success,
    NoMatch,
    AuthError,
    Error,
}

impl OutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Success => "success",
            OutcomeKind::NoMatch => "no_match",
            OutcomeKind::AuthError => "auth_error",
            OutcomeKind::Error => "error",
        }
    }
}

/// Terminal result of one enrichment request
///
/// Returned to the caller and never mutated afterward.
#[derive(Debug, Clone)]
pub enum EnrichmentOutcome {
    /// Fetch, parse, and normalize all succeeded
    Success(CanonicalMetadataRecord),
    /// The external system has no record for the resolved correlation id
    NoMatch { diagnostic: String },
    /// Credentials were rejected, or the endpoint answered 401/403
    AuthError { diagnostic: String },
    /// Any other stage failure (parse, normalize, exhausted retries, ...)
    Error { diagnostic: String },
}

impl EnrichmentOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            EnrichmentOutcome::Success(_) => OutcomeKind::Success,
            EnrichmentOutcome::NoMatch { .. } => OutcomeKind::NoMatch,
            EnrichmentOutcome::AuthError { .. } => OutcomeKind::AuthError,
            EnrichmentOutcome::Error { .. } => OutcomeKind::Error,
        }
    }

    /// Whether the orchestrating caller may retry the whole pipeline
    ///
    /// NoMatch requires operator intervention (a correlation override)
    /// before a retry can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EnrichmentOutcome::AuthError { .. } | EnrichmentOutcome::Error { .. }
        )
    }

    /// Operator diagnostic; None for Success
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            EnrichmentOutcome::Success(_) => None,
            EnrichmentOutcome::NoMatch { diagnostic }
            | EnrichmentOutcome::AuthError { diagnostic }
            | EnrichmentOutcome::Error { diagnostic } => Some(diagnostic),
        }
    }
}

/// Classify a pipeline result into its terminal outcome
pub fn classify(
    result: Result<CanonicalMetadataRecord, StageError>,
) -> EnrichmentOutcome {
    match result {
        Ok(record) => EnrichmentOutcome::Success(record),
        Err(err) => {
            let diagnostic = format!("{}: {}", err.stage(), err_detail(&err));
            match err {
                StageError::Auth(_) => EnrichmentOutcome::AuthError { diagnostic },
                StageError::Fetch(FetchError::Unauthorized(_)) => {
                    EnrichmentOutcome::AuthError { diagnostic }
                }
                StageError::Fetch(FetchError::NoMatch(_)) => {
                    EnrichmentOutcome::NoMatch { diagnostic }
                }
                StageError::Fetch(_)
                | StageError::Parse(_)
                | StageError::Normalize(_)
                | StageError::Internal(_) => EnrichmentOutcome::Error { diagnostic },
            }
        }
    }
}

fn err_detail(err: &StageError) -> String {
    match err {
        StageError::Auth(e) => e.to_string(),
        StageError::Fetch(e) => e.to_string(),
        StageError::Parse(e) => e.to_string(),
        StageError::Normalize(e) => e.to_string(),
        StageError::Internal(msg) => msg.clone(),
    }
}

// ============================================================================
// Tests
// ============================================================================
