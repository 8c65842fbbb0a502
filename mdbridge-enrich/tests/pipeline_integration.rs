//! End-to-end pipeline integration tests
//!
//! Drive the full enrichment pipeline (correlation, auth, fetch, parse,
//! normalize, classify, persist) against a local stub source system.

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use mdbridge_enrich::models::record::EnrichmentStatus;
use mdbridge_enrich::normalize::config::{
    IdentifierMapping, NormalizationConfigDocument, NormalizationConfigRef, TitleMapping,
};
use mdbridge_enrich::normalize::vocab::TitleSlot;
use mdbridge_enrich::outcome::{EnrichmentOutcome, OutcomeKind};
use mdbridge_enrich::pipeline::Enricher;
use mdbridge_enrich::services::{FileSecretStore, RecordStore, SqliteRecordStore};
use mdbridge_enrich::types::{
    AuthScheme, EnrichmentRequest, ResponseFormat, RetryPolicy, SourceSystemParams,
};

async fn spawn_stub(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

struct Harness {
    enricher: Arc<Enricher>,
    record_store: Arc<SqliteRecordStore>,
    _secrets_dir: tempfile::TempDir,
}

/// Build an enricher wired to a tempdir secret store holding one
/// credential document under reference `mam-primary`
async fn harness(credential_json: &str) -> Harness {
    let pool = sqlx::SqlitePool::connect(":memory:").await.unwrap();
    mdbridge_enrich::db::init_tables(&pool).await.unwrap();

    let secrets_dir = tempfile::tempdir().unwrap();
    std::fs::write(secrets_dir.path().join("mam-primary.json"), credential_json).unwrap();

    let record_store = Arc::new(SqliteRecordStore::new(pool));
    let secret_store = Arc::new(FileSecretStore::new(secrets_dir.path().to_path_buf()));
    let enricher = Arc::new(Enricher::new(
        reqwest::Client::new(),
        secret_store,
        record_store.clone(),
    ));

    Harness {
        enricher,
        record_store,
        _secrets_dir: secrets_dir,
    }
}

fn source_params(addr: SocketAddr, auth_type: AuthScheme) -> SourceSystemParams {
    SourceSystemParams {
        metadata_endpoint: format!("http://{}/lookup", addr),
        token_endpoint: Some(format!("http://{}/token", addr)),
        auth_type,
        secret_reference: "mam-primary".to_string(),
        correlation_param: "id".to_string(),
        response_format: ResponseFormat::Json,
        retry: RetryPolicy {
            max_attempts: 2,
            backoff_base_ms: 10,
            request_timeout_secs: 2,
            min_request_interval_ms: None,
        },
    }
}

fn inline_normalization() -> NormalizationConfigRef {
    NormalizationConfigRef {
        inline: Some(NormalizationConfigDocument {
            source_type: Some("mam".to_string()),
            identifier_namespace: Some("ACME".to_string()),
            identifiers: Some(vec![IdentifierMapping {
                source_path: "asset_id".to_string(),
                namespace: None,
            }]),
            titles: Some(vec![TitleMapping {
                slot: TitleSlot::Primary,
                source_paths: vec!["title".to_string()],
            }]),
            ..Default::default()
        }),
        remote_url: None,
    }
}

fn request(
    asset_id: Uuid,
    addr: SocketAddr,
    auth_type: AuthScheme,
    correlation_override: Option<&str>,
) -> EnrichmentRequest {
    EnrichmentRequest {
        asset_id,
        filename: "promo_reel.mov".to_string(),
        correlation_override: correlation_override.map(String::from),
        source: source_params(addr, auth_type),
        normalization: inline_normalization(),
    }
}

/// Stub source system: answers only for correlation id `GOOD-1`
fn matching_stub() -> Router {
    Router::new().route(
        "/lookup",
        get(|Query(params): Query<HashMap<String, String>>| async move {
            if params.get("id").map(String::as_str) == Some("GOOD-1") {
                (
                    StatusCode::OK,
                    json!({"title": "Foo", "asset_id": "X123"}).to_string(),
                )
            } else {
                (StatusCode::NOT_FOUND, String::new())
            }
        }),
    )
}

#[tokio::test]
async fn test_success_round_trip_and_persistence() {
    let addr = spawn_stub(matching_stub()).await;
    let harness = harness(r#"{"api_key": "k-123"}"#).await;
    let asset_id = Uuid::new_v4();

    let outcome = harness
        .enricher
        .enrich_asset(
            request(asset_id, addr, AuthScheme::ApiKey, Some("GOOD-1")),
            CancellationToken::new(),
        )
        .await;

    let record = match outcome {
        EnrichmentOutcome::Success(record) => record,
        other => panic!("expected Success, got {:?}", other.kind()),
    };
    assert_eq!(record.titles.get(&TitleSlot::Primary).unwrap(), "Foo");
    assert_eq!(record.identifiers.len(), 1);
    assert_eq!(record.identifiers[0].namespace, "ACME");
    assert_eq!(record.identifiers[0].value, "X123");

    let status = harness
        .record_store
        .load_status(asset_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status.status, EnrichmentStatus::Success);
    assert_eq!(status.outcome_kind, Some(OutcomeKind::Success));

    let previous = harness
        .record_store
        .last_successful_correlation(asset_id)
        .await
        .unwrap();
    assert_eq!(previous.as_deref(), Some("GOOD-1"));
}

#[tokio::test]
async fn test_successful_override_becomes_durable_for_later_runs() {
    let addr = spawn_stub(matching_stub()).await;
    let harness = harness(r#"{"api_key": "k-123"}"#).await;
    let asset_id = Uuid::new_v4();

    // First run: manual override corrects the correlation
    let first = harness
        .enricher
        .enrich_asset(
            request(asset_id, addr, AuthScheme::ApiKey, Some("GOOD-1")),
            CancellationToken::new(),
        )
        .await;
    assert_eq!(first.kind(), OutcomeKind::Success);

    // Second run without the override: the filename would derive
    // `promo_reel` (a 404), but the recorded success must win
    let second = harness
        .enricher
        .enrich_asset(
            request(asset_id, addr, AuthScheme::ApiKey, None),
            CancellationToken::new(),
        )
        .await;
    assert_eq!(second.kind(), OutcomeKind::Success);
}

#[tokio::test]
async fn test_404_classifies_no_match_and_stores_failed_status() {
    let addr = spawn_stub(matching_stub()).await;
    let harness = harness(r#"{"api_key": "k-123"}"#).await;
    let asset_id = Uuid::new_v4();

    // Filename-derived correlation has no record in the stub
    let outcome = harness
        .enricher
        .enrich_asset(
            request(asset_id, addr, AuthScheme::ApiKey, None),
            CancellationToken::new(),
        )
        .await;

    assert_eq!(outcome.kind(), OutcomeKind::NoMatch);
    assert!(!outcome.is_retryable());

    let status = harness
        .record_store
        .load_status(asset_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status.status, EnrichmentStatus::Failed);
    assert_eq!(status.outcome_kind, Some(OutcomeKind::NoMatch));
    assert!(status.diagnostic.unwrap().contains("no record"));
}

#[tokio::test]
async fn test_401_classifies_auth_error_without_retries() {
    let hits = Arc::new(AtomicU32::new(0));
    let router = Router::new()
        .route(
            "/lookup",
            get(|State(hits): State<Arc<AtomicU32>>| async move {
                hits.fetch_add(1, Ordering::SeqCst);
                StatusCode::UNAUTHORIZED
            }),
        )
        .with_state(hits.clone());
    let addr = spawn_stub(router).await;
    let harness = harness(r#"{"api_key": "expired-key"}"#).await;
    let asset_id = Uuid::new_v4();

    let outcome = harness
        .enricher
        .enrich_asset(
            request(asset_id, addr, AuthScheme::ApiKey, Some("GOOD-1")),
            CancellationToken::new(),
        )
        .await;

    assert_eq!(outcome.kind(), OutcomeKind::AuthError);
    assert!(outcome.is_retryable());
    assert_eq!(hits.load(Ordering::SeqCst), 1, "401 must not be retried");

    let status = harness
        .record_store
        .load_status(asset_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status.status, EnrichmentStatus::Failed);
    assert_eq!(status.outcome_kind, Some(OutcomeKind::AuthError));
}

#[tokio::test]
async fn test_oauth2_requests_one_token_and_attaches_it() {
    let token_hits = Arc::new(AtomicU32::new(0));
    let token_hits_state = token_hits.clone();
    let router = Router::new()
        .route(
            "/token",
            post(|State(hits): State<Arc<AtomicU32>>| async move {
                hits.fetch_add(1, Ordering::SeqCst);
                Json(json!({
                    "access_token": "tok-42",
                    "token_type": "Bearer",
                    "expires_in": 3600
                }))
            }),
        )
        .route(
            "/lookup",
            get(|headers: HeaderMap| async move {
                match headers.get("authorization").and_then(|v| v.to_str().ok()) {
                    Some("Bearer tok-42") => (
                        StatusCode::OK,
                        json!({"title": "Foo", "asset_id": "X123"}).to_string(),
                    ),
                    _ => (StatusCode::UNAUTHORIZED, String::new()),
                }
            }),
        )
        .with_state(token_hits_state);
    let addr = spawn_stub(router).await;

    let harness = harness(r#"{"client_id": "cid", "client_secret": "cs"}"#).await;
    let outcome = harness
        .enricher
        .enrich_asset(
            request(
                Uuid::new_v4(),
                addr,
                AuthScheme::Oauth2ClientCredentials,
                Some("GOOD-1"),
            ),
            CancellationToken::new(),
        )
        .await;

    assert_eq!(outcome.kind(), OutcomeKind::Success);
    assert_eq!(
        token_hits.load(Ordering::SeqCst),
        1,
        "one request, one token"
    );
}

#[tokio::test]
async fn test_rejected_oauth2_credentials_classify_auth_error() {
    let router = Router::new().route(
        "/token",
        post(|| async { (StatusCode::UNAUTHORIZED, "bad client") }),
    );
    let addr = spawn_stub(router).await;

    let harness = harness(r#"{"client_id": "cid", "client_secret": "wrong"}"#).await;
    let outcome = harness
        .enricher
        .enrich_asset(
            request(
                Uuid::new_v4(),
                addr,
                AuthScheme::Oauth2ClientCredentials,
                Some("GOOD-1"),
            ),
            CancellationToken::new(),
        )
        .await;

    assert_eq!(outcome.kind(), OutcomeKind::AuthError);
    assert!(outcome.diagnostic().unwrap().contains("auth"));
}

#[tokio::test]
async fn test_malformed_xml_classifies_error_with_parse_diagnostic() {
    let router = Router::new().route(
        "/lookup",
        get(|| async { (StatusCode::OK, "<asset><title>Foo</asset>") }),
    );
    let addr = spawn_stub(router).await;

    let harness = harness(r#"{"api_key": "k-123"}"#).await;
    let asset_id = Uuid::new_v4();
    let mut req = request(asset_id, addr, AuthScheme::ApiKey, Some("GOOD-1"));
    req.source.response_format = ResponseFormat::Xml;

    let outcome = harness
        .enricher
        .enrich_asset(req, CancellationToken::new())
        .await;

    assert_eq!(outcome.kind(), OutcomeKind::Error);
    assert!(
        outcome.diagnostic().unwrap().contains("parse"),
        "diagnostic must name the parse stage: {:?}",
        outcome.diagnostic()
    );
}

#[tokio::test]
async fn test_batch_isolates_failures_per_asset() {
    let addr = spawn_stub(matching_stub()).await;
    let harness = harness(r#"{"api_key": "k-123"}"#).await;

    let good_asset = Uuid::new_v4();
    let bad_asset = Uuid::new_v4();
    let requests = vec![
        request(good_asset, addr, AuthScheme::ApiKey, Some("GOOD-1")),
        // Derives `promo_reel` from the filename: a NoMatch
        request(bad_asset, addr, AuthScheme::ApiKey, None),
    ];

    let outcomes = harness
        .enricher
        .clone()
        .enrich_batch(requests, &CancellationToken::new())
        .await;

    assert_eq!(outcomes.len(), 2);
    let by_id: HashMap<Uuid, OutcomeKind> = outcomes
        .into_iter()
        .map(|(id, outcome)| (id, outcome.kind()))
        .collect();
    assert_eq!(by_id[&good_asset], OutcomeKind::Success);
    assert_eq!(by_id[&bad_asset], OutcomeKind::NoMatch);
}

#[tokio::test]
async fn test_inline_config_overrides_remote_per_key() {
    // Remote config maps the primary slot from `title`; the inline
    // fragment overrides only the titles table to read `display_name`
    let router = Router::new()
        .route(
            "/lookup",
            get(|| async {
                (
                    StatusCode::OK,
                    json!({
                        "title": "From Title",
                        "display_name": "From Display",
                        "asset_id": "X123"
                    })
                    .to_string(),
                )
            }),
        )
        .route(
            "/config",
            get(|| async {
                Json(json!({
                    "source_type": "mam",
                    "identifier_namespace": "ACME",
                    "identifiers": [{"source_path": "asset_id"}],
                    "titles": [{"slot": "primary", "source_paths": ["title"]}]
                }))
            }),
        );
    let addr = spawn_stub(router).await;

    let harness = harness(r#"{"api_key": "k-123"}"#).await;
    let mut req = request(Uuid::new_v4(), addr, AuthScheme::ApiKey, Some("GOOD-1"));
    req.normalization = NormalizationConfigRef {
        inline: Some(NormalizationConfigDocument {
            titles: Some(vec![TitleMapping {
                slot: TitleSlot::Primary,
                source_paths: vec!["display_name".to_string()],
            }]),
            ..Default::default()
        }),
        remote_url: Some(format!("http://{}/config", addr)),
    };

    let outcome = harness
        .enricher
        .enrich_asset(req, CancellationToken::new())
        .await;

    let record = match outcome {
        EnrichmentOutcome::Success(record) => record,
        other => panic!("expected Success, got {:?}", other.kind()),
    };
    assert_eq!(
        record.titles.get(&TitleSlot::Primary).unwrap(),
        "From Display",
        "inline titles table must replace the remote one"
    );
    // Keys the inline fragment left untouched keep their remote values
    assert_eq!(record.identifiers.len(), 1);
    assert_eq!(record.identifiers[0].namespace, "ACME");
}
