//! Normalization configuration
//!
//! A declarative mapping document projecting source fields onto the
//! canonical vocabulary. The document may arrive inline with the request,
//! as a remotely stored document, or both; inline fields override remote
//! fields at top-level-key granularity: an inline `titles` table replaces
//! the remote `titles` table wholesale. The merge is an explicit
//! field-by-field function, not a recursive one.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

use crate::normalize::vocab::TitleSlot;
use crate::types::NormalizeError;

/// Timeout for fetching a remotely stored config document
const CONFIG_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

fn default_name_field() -> String {
    "name".to_string()
}

fn default_system_field() -> String {
    "system".to_string()
}

fn default_value_field() -> String {
    "value".to_string()
}

/// One identifier mapping: source path → namespaced identifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifierMapping {
    /// Dot-separated path into the generic tree
    pub source_path: String,
    /// Namespace for the produced identifier; the config-level customer
    /// prefix when absent
    #[serde(default)]
    pub namespace: Option<String>,
}

/// One title mapping: ordered source paths → canonical slot
///
/// The first non-empty source match fills the slot; there is no fallback
/// across slots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TitleMapping {
    pub slot: TitleSlot,
    pub source_paths: Vec<String>,
}

/// One people mapping: a source sequence of person structures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeopleMapping {
    pub source_path: String,
    /// Field holding the person name inside each entry
    #[serde(default = "default_name_field")]
    pub name_field: String,
    /// Field holding the role; entries without it get the `unspecified`
    /// sentinel
    #[serde(default)]
    pub role_field: Option<String>,
}

/// One ratings mapping: a source sequence of rating structures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingMapping {
    pub source_path: String,
    #[serde(default = "default_system_field")]
    pub system_field: String,
    #[serde(default = "default_value_field")]
    pub value_field: String,
    /// Field scoping the rating by region, when the source distinguishes
    /// regions
    #[serde(default)]
    pub region_field: Option<String>,
    /// Source rating-system name → canonical rating-system name
    #[serde(default)]
    pub systems: BTreeMap<String, String>,
}

/// A normalization config document as stored or transmitted
///
/// Every field is optional so that a partial inline document can override
/// individual top-level keys of a remote one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormalizationConfigDocument {
    pub source_type: Option<String>,
    /// Customer prefix used as the default identifier namespace
    pub identifier_namespace: Option<String>,
    pub include_raw_source: Option<bool>,
    pub identifiers: Option<Vec<IdentifierMapping>>,
    pub titles: Option<Vec<TitleMapping>>,
    pub people: Option<Vec<PeopleMapping>>,
    pub ratings: Option<Vec<RatingMapping>>,
}

/// Where the normalization config for a request comes from
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormalizationConfigRef {
    /// Inline document; overrides remote fields per top-level key
    #[serde(default)]
    pub inline: Option<NormalizationConfigDocument>,
    /// URL of a remotely stored document
    #[serde(default)]
    pub remote_url: Option<String>,
}

/// Fully resolved normalization config, one per request
#[derive(Debug, Clone)]
pub struct NormalizationConfig {
    pub source_type: String,
    pub identifier_namespace: String,
    pub include_raw_source: bool,
    pub identifiers: Vec<IdentifierMapping>,
    pub titles: Vec<TitleMapping>,
    pub people: Vec<PeopleMapping>,
    pub ratings: Vec<RatingMapping>,
}

impl NormalizationConfig {
    /// True when no mapping table has any entries
    pub fn has_no_mappings(&self) -> bool {
        self.identifiers.is_empty()
            && self.titles.is_empty()
            && self.people.is_empty()
            && self.ratings.is_empty()
    }
}

/// Load the config for one request, fetching the remote document when
/// referenced and merging inline fields over it
pub async fn load(
    reference: &NormalizationConfigRef,
    http_client: &reqwest::Client,
) -> Result<NormalizationConfig, NormalizeError> {
    let remote = match reference.remote_url.as_deref() {
        Some(url) => Some(fetch_remote(url, http_client).await?),
        None => None,
    };
    merge(reference.inline.clone(), remote)
}

async fn fetch_remote(
    url: &str,
    http_client: &reqwest::Client,
) -> Result<NormalizationConfigDocument, NormalizeError> {
    debug!(url = %url, "Fetching remote normalization config");

    let response = http_client
        .get(url)
        .timeout(CONFIG_FETCH_TIMEOUT)
        .send()
        .await
        .map_err(|e| NormalizeError::Config(format!("remote config fetch failed: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(NormalizeError::Config(format!(
            "remote config fetch returned {}",
            status
        )));
    }

    response
        .json()
        .await
        .map_err(|e| NormalizeError::Config(format!("remote config not parseable: {}", e)))
}

/// Shallow per-key merge of an inline document over a remote one
///
/// Explicit field-by-field, so precedence on nested tables stays
/// unambiguous: top-level keys are the override granularity.
pub fn merge(
    inline: Option<NormalizationConfigDocument>,
    remote: Option<NormalizationConfigDocument>,
) -> Result<NormalizationConfig, NormalizeError> {
    if inline.is_none() && remote.is_none() {
        return Err(NormalizeError::Config(
            "no normalization config supplied (neither inline nor remote)".to_string(),
        ));
    }
    let inline = inline.unwrap_or_default();
    let remote = remote.unwrap_or_default();

    let source_type = inline
        .source_type
        .or(remote.source_type)
        .ok_or_else(|| NormalizeError::Config("config is missing 'source_type'".to_string()))?;

    // The customer prefix falls back to the source type when unset
    let identifier_namespace = inline
        .identifier_namespace
        .or(remote.identifier_namespace)
        .unwrap_or_else(|| source_type.clone());

    Ok(NormalizationConfig {
        identifier_namespace,
        include_raw_source: inline
            .include_raw_source
            .or(remote.include_raw_source)
            .unwrap_or(false),
        identifiers: inline
            .identifiers
            .or(remote.identifiers)
            .unwrap_or_default(),
        titles: inline.titles.or(remote.titles).unwrap_or_default(),
        people: inline.people.or(remote.people).unwrap_or_default(),
        ratings: inline.ratings.or(remote.ratings).unwrap_or_default(),
        source_type,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn remote_doc() -> NormalizationConfigDocument {
        serde_json::from_value(serde_json::json!({
            "source_type": "mam",
            "identifier_namespace": "ACME",
            "include_raw_source": false,
            "titles": [
                {"slot": "primary", "source_paths": ["title"]}
            ],
            "identifiers": [
                {"source_path": "asset_id"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_no_config_at_all_is_an_error() {
        let result = merge(None, None);
        assert!(matches!(result, Err(NormalizeError::Config(_))));
    }

    #[test]
    fn test_remote_only_resolves() {
        let config = merge(None, Some(remote_doc())).unwrap();
        assert_eq!(config.source_type, "mam");
        assert_eq!(config.identifier_namespace, "ACME");
        assert_eq!(config.titles.len(), 1);
        assert!(!config.include_raw_source);
    }

    #[test]
    fn test_inline_key_overrides_remote_key() {
        let inline = NormalizationConfigDocument {
            include_raw_source: Some(true),
            titles: Some(vec![TitleMapping {
                slot: TitleSlot::Description,
                source_paths: vec!["summary".to_string()],
            }]),
            ..Default::default()
        };
        let config = merge(Some(inline), Some(remote_doc())).unwrap();

        // Overridden keys take the inline value wholesale
        assert!(config.include_raw_source);
        assert_eq!(config.titles.len(), 1);
        assert_eq!(config.titles[0].slot, TitleSlot::Description);
        // Untouched keys keep the remote value
        assert_eq!(config.source_type, "mam");
        assert_eq!(config.identifiers.len(), 1);
    }

    #[test]
    fn test_namespace_defaults_to_source_type() {
        let doc = NormalizationConfigDocument {
            source_type: Some("dam".to_string()),
            ..Default::default()
        };
        let config = merge(Some(doc), None).unwrap();
        assert_eq!(config.identifier_namespace, "dam");
        assert!(config.has_no_mappings());
    }

    #[test]
    fn test_missing_source_type_is_an_error() {
        let doc = NormalizationConfigDocument {
            include_raw_source: Some(true),
            ..Default::default()
        };
        assert!(matches!(
            merge(Some(doc), None),
            Err(NormalizeError::Config(_))
        ));
    }

    #[test]
    fn test_mapping_field_defaults() {
        let mapping: PeopleMapping =
            serde_json::from_value(serde_json::json!({"source_path": "cast"})).unwrap();
        assert_eq!(mapping.name_field, "name");
        assert!(mapping.role_field.is_none());

        let mapping: RatingMapping =
            serde_json::from_value(serde_json::json!({"source_path": "ratings"})).unwrap();
        assert_eq!(mapping.system_field, "system");
        assert_eq!(mapping.value_field, "value");
        assert!(mapping.systems.is_empty());
    }
}
