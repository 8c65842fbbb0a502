//! Metadata fetch against the external source system
//!
//! Builds the lookup request by injecting the correlation id as a named
//! query parameter, attaches the auth context headers, and issues the
//! call with a bounded timeout. Transient failures (timeout, connection
//! failure, 5xx) are retried with exponential backoff inside an explicit
//! loop carrying the attempt counter; 401/403 and 404 short-circuit
//! immediately so the classifier can map them to AuthError and NoMatch.
//!
//! A caller-supplied cancellation token aborts an in-flight call (or a
//! backoff sleep) promptly.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::types::{AuthContext, FetchError, RetryPolicy};

/// Minimum-interval rate limiter for the external endpoint
///
/// Some source systems impose request-rate terms; when a minimum interval
/// is configured every attempt (including retries) waits its turn.
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval: Duration) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval,
        }
    }

    async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                debug!(wait_ms = wait_time.as_millis() as u64, "Rate limiting outbound request");
                sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

/// Metadata fetcher
///
/// One fetcher serves one request; the retry policy comes from the
/// request's source-system parameters, not from compiled constants.
pub struct MetadataFetcher {
    http_client: reqwest::Client,
    policy: RetryPolicy,
    rate_limiter: Option<Arc<RateLimiter>>,
}

impl MetadataFetcher {
    pub fn new(http_client: reqwest::Client, policy: RetryPolicy) -> Self {
        let rate_limiter = policy
            .min_request_interval_ms
            .map(|ms| Arc::new(RateLimiter::new(Duration::from_millis(ms))));
        Self {
            http_client,
            policy,
            rate_limiter,
        }
    }

    /// Fetch the raw response body for one correlation id
    ///
    /// # Errors
    /// - `FetchError::Unauthorized` on 401/403 (never retried)
    /// - `FetchError::NoMatch` on 404 or an empty/shape-less 200
    /// - `FetchError::Transient` when retries are exhausted
    /// - `FetchError::Permanent` on unexpected statuses or cancellation
    pub async fn fetch(
        &self,
        endpoint: &str,
        auth: &AuthContext,
        correlation_id: &str,
        correlation_param: &str,
        cancel: &CancellationToken,
    ) -> Result<String, FetchError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1u32;

        loop {
            if let Some(ref limiter) = self.rate_limiter {
                limiter.wait().await;
            }

            debug!(
                endpoint = %endpoint,
                correlation_id = %correlation_id,
                attempt,
                max_attempts,
                "Fetching external metadata"
            );

            match self
                .attempt(endpoint, auth, correlation_id, correlation_param, cancel)
                .await
            {
                Ok(body) => return Ok(body),
                Err(FetchError::Transient(detail)) => {
                    if attempt >= max_attempts {
                        return Err(FetchError::Transient(format!(
                            "{} (after {} attempts)",
                            detail, attempt
                        )));
                    }

                    // Explicit exponential backoff: base * 2^(attempt-1)
                    let delay = Duration::from_millis(
                        self.policy.backoff_base_ms.saturating_mul(1u64 << (attempt - 1).min(16)),
                    );
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        detail = %detail,
                        "Transient fetch failure, backing off"
                    );

                    tokio::select! {
                        _ = cancel.cancelled() => {
                            return Err(FetchError::Permanent(
                                "request cancelled during backoff".to_string(),
                            ));
                        }
                        _ = sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(other) => return Err(other),
            }
        }
    }

    /// One request attempt; classifies the response into the fetch error
    /// taxonomy
    async fn attempt(
        &self,
        endpoint: &str,
        auth: &AuthContext,
        correlation_id: &str,
        correlation_param: &str,
        cancel: &CancellationToken,
    ) -> Result<String, FetchError> {
        let mut request = self
            .http_client
            .get(endpoint)
            .query(&[(correlation_param, correlation_id)])
            .timeout(Duration::from_secs(self.policy.request_timeout_secs));

        for (name, value) in &auth.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = tokio::select! {
            _ = cancel.cancelled() => {
                return Err(FetchError::Permanent(
                    "request cancelled while in flight".to_string(),
                ));
            }
            result = request.send() => {
                result.map_err(classify_reqwest_error)?
            }
        };

        let status = response.status();
        match status.as_u16() {
            200..=299 => {
                let body = tokio::select! {
                    _ = cancel.cancelled() => {
                        return Err(FetchError::Permanent(
                            "request cancelled while reading body".to_string(),
                        ));
                    }
                    body = response.text() => {
                        body.map_err(classify_reqwest_error)?
                    }
                };

                if is_empty_match(&body) {
                    return Err(FetchError::NoMatch(format!(
                        "external system returned {} with an empty body for correlation id '{}'",
                        status, correlation_id
                    )));
                }
                Ok(body)
            }
            401 | 403 => Err(FetchError::Unauthorized(format!(
                "external system returned {}",
                status
            ))),
            404 => Err(FetchError::NoMatch(format!(
                "external system has no record for correlation id '{}'",
                correlation_id
            ))),
            500..=599 => Err(FetchError::Transient(format!(
                "external system returned {}",
                status
            ))),
            _ => Err(FetchError::Permanent(format!(
                "external system returned unexpected status {}",
                status
            ))),
        }
    }
}

/// Map reqwest transport errors onto the retry taxonomy
fn classify_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        FetchError::Transient(err.to_string())
    } else {
        FetchError::Permanent(err.to_string())
    }
}

/// Whether a 2xx body counts as "no matching record"
///
/// Empty, whitespace-only, and structurally empty JSON bodies carry no
/// record; anything else is handed to the parser.
fn is_empty_match(body: &str) -> bool {
    let trimmed = body.trim();
    trimmed.is_empty() || matches!(trimmed, "null" | "{}" | "[]")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_match_detection() {
        assert!(is_empty_match(""));
        assert!(is_empty_match("   \n"));
        assert!(is_empty_match("null"));
        assert!(is_empty_match(" {} "));
        assert!(is_empty_match("[]"));
        assert!(!is_empty_match("{\"title\":\"Foo\"}"));
        assert!(!is_empty_match("<asset/>"));
    }

    #[tokio::test]
    async fn test_rate_limiter_enforces_min_interval() {
        let limiter = RateLimiter::new(Duration::from_millis(200));

        let start = Instant::now();
        limiter.wait().await;
        assert!(
            start.elapsed() < Duration::from_millis(100),
            "first request should not wait"
        );

        let start = Instant::now();
        limiter.wait().await;
        assert!(
            start.elapsed() >= Duration::from_millis(150),
            "second request should wait out the interval"
        );
    }

    // Status-code classification and retry behavior are covered against a
    // live local endpoint in tests/fetch_integration.rs.
}
