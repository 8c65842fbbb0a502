//! Core Types for mdbridge-enrich
//!
//! Defines the data model shared by the enrichment pipeline stages:
//! - Per-invocation request and source-system parameters
//! - Correlation decisions (which external record belongs to an asset)
//! - Authorization contexts produced by the auth stage
//! - The generic tree produced by response parsing
//! - The stage error taxonomy consumed by the outcome classifier
//!
//! # Architecture
//! Stages run strictly sequentially per asset:
//! resolve → authenticate → fetch → parse → normalize → classify.
//! Each stage owns one error type below; the classifier maps them onto the
//! four terminal outcomes.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::normalize::config::NormalizationConfigRef;

// ============================================================================
// Request Types
// ============================================================================

/// One enrichment invocation for one asset
///
/// Immutable once constructed; the trigger layer builds one per batch item.
#[derive(Debug, Clone)]
pub struct EnrichmentRequest {
    /// Internal asset UUID
    pub asset_id: Uuid,
    /// Asset filename, used as the correlation fallback
    pub filename: String,
    /// Manual correlation override (always wins when non-empty)
    pub correlation_override: Option<String>,
    /// External source-system connection parameters
    pub source: SourceSystemParams,
    /// Normalization configuration (inline, remote, or both)
    pub normalization: NormalizationConfigRef,
}

/// Connection parameters for the external source-of-record system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSystemParams {
    /// Metadata lookup endpoint URL
    pub metadata_endpoint: String,
    /// Token endpoint URL (required for OAuth2 client credentials)
    pub token_endpoint: Option<String>,
    /// Authentication scheme
    pub auth_type: AuthScheme,
    /// Reference into the secret store for the credential document
    pub secret_reference: String,
    /// Query parameter name carrying the correlation id
    pub correlation_param: String,
    /// Declared response payload format (never content-sniffed)
    pub response_format: ResponseFormat,
    /// Retry/backoff/timeout settings; service defaults when omitted
    #[serde(default)]
    pub retry: RetryPolicy,
}

/// Authentication scheme against the external system
///
/// Closed set; dispatched by exhaustive match, not dynamic lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthScheme {
    /// OAuth2 client-credentials grant against the token endpoint
    Oauth2ClientCredentials,
    /// Static API key wrapped into a header
    ApiKey,
    /// RFC 7617 Basic credentials
    BasicAuth,
}

/// Declared response payload format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    Json,
    Xml,
}

/// Retry and timeout settings for the metadata fetch
///
/// Both the backoff base and the attempt ceiling are configuration inputs;
/// nothing here is hardcoded into the fetch loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum attempt count (first try included)
    pub max_attempts: u32,
    /// Base delay for exponential backoff, in milliseconds
    pub backoff_base_ms: u64,
    /// Per-request timeout, in seconds
    pub request_timeout_secs: u64,
    /// Minimum interval between outgoing requests, in milliseconds
    /// (outbound rate limiting; disabled when absent)
    pub min_request_interval_ms: Option<u64>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_ms: 500,
            request_timeout_secs: 15,
            min_request_interval_ms: None,
        }
    }
}

// ============================================================================
// Correlation Types
// ============================================================================

/// How a correlation id was determined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationOrigin {
    /// Manual override supplied with the request
    Override,
    /// Reused from the last successful run for this asset
    PreviousSuccess,
    /// Derived from the asset filename with its extension stripped
    FilenameDerived,
}

/// Resolved external-system identifier for one request
///
/// Created once per request, never mutated, consumed by the fetch stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationDecision {
    /// Identifier used to locate the record in the external system
    pub resolved_id: String,
    /// Provenance of the identifier
    pub origin: CorrelationOrigin,
}

// ============================================================================
// Auth Types
// ============================================================================

/// Advertised token lifetimes are trimmed by this margin to absorb clock
/// skew against the token endpoint.
pub const TOKEN_EXPIRY_SKEW_SECS: i64 = 30;

/// Request-ready authorization context
///
/// Owned by the fetch stage for the duration of one request; never
/// persisted. Token-based contexts carry an expiry and must be
/// re-validated before any reuse.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Scheme that produced this context
    pub scheme: AuthScheme,
    /// Materialized request headers (name, value), additional headers merged
    pub headers: Vec<(String, String)>,
    /// Token expiry for token-based schemes
    pub expires_at: Option<DateTime<Utc>>,
}

impl AuthContext {
    /// Whether this context may still be attached to a request
    ///
    /// Contexts without an expiry (api_key, basic_auth) never expire.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expiry) => Utc::now() + Duration::seconds(TOKEN_EXPIRY_SKEW_SECS) >= expiry,
            None => false,
        }
    }
}

// ============================================================================
// Generic Tree
// ============================================================================

/// Reserved key prefix marking XML attributes inside a tree node
pub const ATTRIBUTE_PREFIX: &str = "@";

/// Reserved key holding the text content of an XML element that also has
/// attributes or children
pub const TEXT_KEY: &str = "#text";

/// Scalar leaf value of a parsed response document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    String(String),
    Number(f64),
    Bool(bool),
    Null,
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::String(s) => write!(f, "{}", s),
            // Whole numbers render without a trailing ".0" so identifiers
            // survive JSON number round-trips intact
            ScalarValue::Number(n) if n.fract() == 0.0 && n.is_finite() => {
                write!(f, "{}", *n as i64)
            }
            ScalarValue::Number(n) => write!(f, "{}", n),
            ScalarValue::Bool(b) => write!(f, "{}", b),
            ScalarValue::Null => write!(f, ""),
        }
    }
}

/// Format-agnostic parsed response content
///
/// JSON objects and XML elements become trees, JSON arrays and repeated
/// XML sibling tags become sequences, everything else is a scalar. Keys
/// within a tree are unique; ordering is irrelevant (and kept stable by
/// the BTreeMap so downstream output is deterministic).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GenericNode {
    Scalar(ScalarValue),
    Sequence(Vec<GenericNode>),
    Tree(BTreeMap<String, GenericNode>),
}

impl GenericNode {
    /// Look up a dot-separated path of tree keys
    ///
    /// Descends through trees only; hitting a scalar or sequence before
    /// the path is exhausted is a miss, not an error.
    pub fn get_path(&self, path: &str) -> Option<&GenericNode> {
        let mut current = self;
        for segment in path.split('.') {
            match current {
                GenericNode::Tree(map) => current = map.get(segment)?,
                _ => return None,
            }
        }
        Some(current)
    }

    /// Scalar accessor; None for sequences and trees
    pub fn as_scalar(&self) -> Option<&ScalarValue> {
        match self {
            GenericNode::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Sequence accessor; None for scalars and trees
    pub fn as_sequence(&self) -> Option<&[GenericNode]> {
        match self {
            GenericNode::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Tree accessor; None for scalars and sequences
    pub fn as_tree(&self) -> Option<&BTreeMap<String, GenericNode>> {
        match self {
            GenericNode::Tree(map) => Some(map),
            _ => None,
        }
    }
}

// ============================================================================
// Stage Error Taxonomy
// ============================================================================

/// Auth stage failure
#[derive(Debug, Error)]
pub enum AuthError {
    /// Token endpoint rejected the credentials
    #[error("Credentials rejected: {0}")]
    Rejected(String),

    /// Token request timed out or failed to connect
    #[error("Token request failed: {0}")]
    Unreachable(String),

    /// Token endpoint returned a response that is not a token document
    #[error("Malformed token response: {0}")]
    MalformedToken(String),

    /// Credential document is missing fields the scheme requires
    #[error("Credential document incomplete: {0}")]
    IncompleteCredentials(String),
}

/// Fetch stage failure
///
/// Transient failures are retried inside the fetch loop; every other
/// variant short-circuits immediately.
#[derive(Debug, Error)]
pub enum FetchError {
    /// 401/403 from the external endpoint; never retried
    #[error("Unauthorized by external system: {0}")]
    Unauthorized(String),

    /// 404 or an empty/shape-less 200; the external system has no record
    #[error("No matching record: {0}")]
    NoMatch(String),

    /// Timeout, connection failure, or 5xx; retried up to the ceiling
    #[error("Transient fetch failure: {0}")]
    Transient(String),

    /// Non-retryable failure (unexpected status, cancellation)
    #[error("Fetch failed: {0}")]
    Permanent(String),
}

/// Parse stage failure
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Malformed JSON: {0}")]
    Json(String),

    #[error("Malformed XML: {0}")]
    Xml(String),
}

/// Normalization stage failure
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// The tree cannot support the configured mappings at all
    /// (e.g. top-level scalar where mappings were required)
    #[error("Source document unusable: {0}")]
    UnusableTree(String),

    /// Normalization configuration could not be loaded or merged
    #[error("Normalization config error: {0}")]
    Config(String),
}

/// Failure of any pipeline stage, tagged with its origin
///
/// The outcome classifier consumes this exhaustively; no stage swallows an
/// error of a type it did not explicitly define as a soft miss.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("auth: {0}")]
    Auth(#[from] AuthError),

    #[error("fetch: {0}")]
    Fetch(#[from] FetchError),

    #[error("parse: {0}")]
    Parse(#[from] ParseError),

    #[error("normalize: {0}")]
    Normalize(#[from] NormalizeError),

    /// Infrastructure fault outside the stage taxonomy (store, I/O)
    #[error("internal: {0}")]
    Internal(String),
}

impl StageError {
    /// Stage of origin, for operator diagnostics
    pub fn stage(&self) -> &'static str {
        match self {
            StageError::Auth(_) => "auth",
            StageError::Fetch(_) => "fetch",
            StageError::Parse(_) => "parse",
            StageError::Normalize(_) => "normalize",
            StageError::Internal(_) => "internal",
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_display_renders_whole_numbers_without_fraction() {
        assert_eq!(ScalarValue::Number(42.0).to_string(), "42");
        assert_eq!(ScalarValue::Number(1.5).to_string(), "1.5");
        assert_eq!(ScalarValue::String("X123".into()).to_string(), "X123");
        assert_eq!(ScalarValue::Null.to_string(), "");
    }

    #[test]
    fn test_get_path_descends_trees() {
        let mut inner = BTreeMap::new();
        inner.insert(
            "title".to_string(),
            GenericNode::Scalar(ScalarValue::String("Foo".into())),
        );
        let mut root = BTreeMap::new();
        root.insert("asset".to_string(), GenericNode::Tree(inner));
        let tree = GenericNode::Tree(root);

        let found = tree.get_path("asset.title").unwrap();
        assert_eq!(
            found.as_scalar(),
            Some(&ScalarValue::String("Foo".into()))
        );
        assert!(tree.get_path("asset.missing").is_none());
        assert!(tree.get_path("asset.title.deeper").is_none());
    }

    #[test]
    fn test_auth_context_without_expiry_never_expires() {
        let ctx = AuthContext {
            scheme: AuthScheme::ApiKey,
            headers: vec![("Authorization".into(), "Bearer k".into())],
            expires_at: None,
        };
        assert!(!ctx.is_expired());
    }

    #[test]
    fn test_auth_context_expiry_applies_skew() {
        // Expiry 10s out is inside the 30s skew margin, so already expired
        let ctx = AuthContext {
            scheme: AuthScheme::Oauth2ClientCredentials,
            headers: vec![],
            expires_at: Some(Utc::now() + Duration::seconds(10)),
        };
        assert!(ctx.is_expired());

        let fresh = AuthContext {
            scheme: AuthScheme::Oauth2ClientCredentials,
            headers: vec![],
            expires_at: Some(Utc::now() + Duration::seconds(3600)),
        };
        assert!(!fresh.is_expired());
    }

    #[test]
    fn test_retry_policy_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.backoff_base_ms, 500);
        assert!(policy.min_request_interval_ms.is_none());
    }
}
