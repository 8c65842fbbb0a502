//! Authentication against the external source system
//!
//! Produces a request-ready [`AuthContext`] for one of three schemes.
//! The scheme set is closed and dispatched by exhaustive match; only the
//! OAuth2 client-credentials variant performs a network call. Additional
//! headers from the credential document (e.g. a subscription key) are
//! merged into the context regardless of scheme.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration as StdDuration;
use tracing::debug;

use crate::types::{AuthContext, AuthError, AuthScheme};

/// Timeout for the OAuth2 token request
const TOKEN_REQUEST_TIMEOUT: StdDuration = StdDuration::from_secs(10);

/// Token lifetime assumed when the token endpoint omits `expires_in`
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Credential document fetched from the secret store
///
/// A single shape covers all three schemes; `authenticate` validates that
/// the fields its scheme requires are present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredentialDocument {
    // oauth2_client_credentials
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    // api_key
    pub api_key: Option<String>,
    /// Header carrying the key; defaults to `Authorization`
    pub api_key_header: Option<String>,
    /// Value prefix, e.g. `Bearer `; applied only on the default header
    pub api_key_prefix: Option<String>,
    // basic_auth
    pub username: Option<String>,
    pub password: Option<String>,
    /// Extra headers attached to every outgoing request
    #[serde(default)]
    pub additional_headers: BTreeMap<String, String>,
}

/// OAuth2 token endpoint response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Auth provider
///
/// Stateless apart from its HTTP client; one provider serves all
/// requests. The produced context caches the token (and its expiry) for
/// the lifetime of the single request, so repeated sends within one
/// request never re-request a token.
pub struct AuthProvider {
    http_client: reqwest::Client,
}

impl AuthProvider {
    pub fn new(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }

    /// Produce an authorization context for the given scheme
    ///
    /// # Errors
    /// Returns `AuthError` when the token endpoint rejects the
    /// credentials, times out, or returns a malformed token response, or
    /// when the credential document lacks fields the scheme requires.
    pub async fn authenticate(
        &self,
        scheme: AuthScheme,
        credentials: &CredentialDocument,
        token_endpoint: Option<&str>,
    ) -> Result<AuthContext, AuthError> {
        let mut context = match scheme {
            AuthScheme::ApiKey => self.api_key_context(credentials)?,
            AuthScheme::BasicAuth => self.basic_auth_context(credentials)?,
            AuthScheme::Oauth2ClientCredentials => {
                self.client_credentials_context(credentials, token_endpoint)
                    .await?
            }
        };

        for (name, value) in &credentials.additional_headers {
            context.headers.push((name.clone(), value.clone()));
        }

        debug!(
            scheme = ?scheme,
            header_count = context.headers.len(),
            expires = ?context.expires_at,
            "Auth context ready"
        );
        Ok(context)
    }

    /// Wrap the stored key into a header; no network call
    fn api_key_context(&self, credentials: &CredentialDocument) -> Result<AuthContext, AuthError> {
        let key = credentials.api_key.as_deref().ok_or_else(|| {
            AuthError::IncompleteCredentials("api_key scheme requires 'api_key'".to_string())
        })?;

        let (header, value) = match credentials.api_key_header.as_deref() {
            // Custom header: raw key, no prefix unless configured
            Some(header) => {
                let prefix = credentials.api_key_prefix.as_deref().unwrap_or("");
                (header.to_string(), format!("{}{}", prefix, key))
            }
            None => {
                let prefix = credentials.api_key_prefix.as_deref().unwrap_or("Bearer ");
                ("Authorization".to_string(), format!("{}{}", prefix, key))
            }
        };

        Ok(AuthContext {
            scheme: AuthScheme::ApiKey,
            headers: vec![(header, value)],
            expires_at: None,
        })
    }

    /// RFC 7617 Basic credentials; no network call
    fn basic_auth_context(
        &self,
        credentials: &CredentialDocument,
    ) -> Result<AuthContext, AuthError> {
        let username = credentials.username.as_deref().ok_or_else(|| {
            AuthError::IncompleteCredentials("basic_auth scheme requires 'username'".to_string())
        })?;
        let password = credentials.password.as_deref().ok_or_else(|| {
            AuthError::IncompleteCredentials("basic_auth scheme requires 'password'".to_string())
        })?;

        let encoded = BASE64.encode(format!("{}:{}", username, password));
        Ok(AuthContext {
            scheme: AuthScheme::BasicAuth,
            headers: vec![("Authorization".to_string(), format!("Basic {}", encoded))],
            expires_at: None,
        })
    }

    /// OAuth2 client-credentials token request
    async fn client_credentials_context(
        &self,
        credentials: &CredentialDocument,
        token_endpoint: Option<&str>,
    ) -> Result<AuthContext, AuthError> {
        let client_id = credentials.client_id.as_deref().ok_or_else(|| {
            AuthError::IncompleteCredentials(
                "oauth2_client_credentials scheme requires 'client_id'".to_string(),
            )
        })?;
        let client_secret = credentials.client_secret.as_deref().ok_or_else(|| {
            AuthError::IncompleteCredentials(
                "oauth2_client_credentials scheme requires 'client_secret'".to_string(),
            )
        })?;
        let endpoint = token_endpoint.ok_or_else(|| {
            AuthError::IncompleteCredentials(
                "oauth2_client_credentials scheme requires a token endpoint".to_string(),
            )
        })?;

        debug!(endpoint = %endpoint, "Requesting OAuth2 token");

        let response = self
            .http_client
            .post(endpoint)
            .timeout(TOKEN_REQUEST_TIMEOUT)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", client_id),
                ("client_secret", client_secret),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AuthError::Unreachable(format!("token request timed out: {}", e))
                } else {
                    AuthError::Unreachable(format!("token request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Rejected(format!(
                "token endpoint returned {}: {}",
                status, body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::MalformedToken(e.to_string()))?;

        if token.access_token.is_empty() {
            return Err(AuthError::MalformedToken(
                "token endpoint returned an empty access_token".to_string(),
            ));
        }

        let token_type = token.token_type.as_deref().unwrap_or("Bearer");
        let lifetime = token.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);

        Ok(AuthContext {
            scheme: AuthScheme::Oauth2ClientCredentials,
            headers: vec![(
                "Authorization".to_string(),
                format!("{} {}", token_type, token.access_token),
            )],
            expires_at: Some(Utc::now() + Duration::seconds(lifetime)),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
