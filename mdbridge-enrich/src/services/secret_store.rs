//! Secret store collaborator
//!
//! Read-only fetch of a credential document by reference. The default
//! implementation resolves a reference through two tiers, highest
//! priority first:
//! 1. Environment variable `MDBRIDGE_SECRET_<REFERENCE>` holding the
//!    document as JSON
//! 2. `<secrets_folder>/<reference>.json` on disk
//!
//! When both tiers hold a document the environment wins and the overlap
//! is logged as a potential misconfiguration.

use async_trait::async_trait;
use mdbridge_common::{Error, Result};
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::auth::CredentialDocument;

/// Read-only credential lookup by reference
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get(&self, reference: &str) -> Result<CredentialDocument>;
}

/// File/environment-backed secret store
pub struct FileSecretStore {
    secrets_folder: PathBuf,
}

impl FileSecretStore {
    pub fn new(secrets_folder: PathBuf) -> Self {
        Self { secrets_folder }
    }

    fn env_var_name(reference: &str) -> String {
        let normalized: String = reference
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("MDBRIDGE_SECRET_{}", normalized)
    }

    /// References name files inside the secrets folder; path separators
    /// and parent traversal are rejected outright
    fn validate_reference(reference: &str) -> Result<()> {
        if reference.is_empty() {
            return Err(Error::InvalidInput("empty secret reference".to_string()));
        }
        if reference.contains('/') || reference.contains('\\') || reference.contains("..") {
            return Err(Error::InvalidInput(format!(
                "secret reference contains path separators: {}",
                reference
            )));
        }
        Ok(())
    }

    fn parse_document(raw: &str, origin: &str) -> Result<CredentialDocument> {
        serde_json::from_str(raw).map_err(|e| {
            Error::Config(format!("credential document from {} not parseable: {}", origin, e))
        })
    }
}

#[async_trait]
impl SecretStore for FileSecretStore {
    async fn get(&self, reference: &str) -> Result<CredentialDocument> {
        Self::validate_reference(reference)?;

        let env_doc = std::env::var(Self::env_var_name(reference)).ok();
        let file_path = self.secrets_folder.join(format!("{}.json", reference));
        let file_exists = file_path.exists();

        if env_doc.is_some() && file_exists {
            warn!(
                reference = %reference,
                "Credential found in both environment and secrets folder; using environment"
            );
        }

        if let Some(raw) = env_doc {
            debug!(reference = %reference, "Credential document loaded from environment");
            return Self::parse_document(&raw, "environment");
        }

        if file_exists {
            let raw = tokio::fs::read_to_string(&file_path).await?;
            debug!(
                reference = %reference,
                path = %file_path.display(),
                "Credential document loaded from secrets folder"
            );
            return Self::parse_document(&raw, "secrets folder");
        }

        Err(Error::NotFound(format!(
            "no credential document for reference '{}'",
            reference
        )))
    }
}

// ============================================================================
// Tests
// ============================================================================
