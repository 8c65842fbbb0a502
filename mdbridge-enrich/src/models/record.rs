//! Canonical metadata record and persistence status models
//!
//! The canonical record is the only entity the record store persists for
//! an asset. All maps are ordered so that an unchanged source document and
//! unchanged config serialize to byte-identical output on re-runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::normalize::vocab::{PersonRole, RatingRegion, TitleSlot};
use crate::outcome::OutcomeKind;

/// Namespaced external identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NamespacedIdentifier {
    /// Customer-defined namespace string
    pub namespace: String,
    /// Identifier value within the namespace
    pub value: String,
}

/// Canonical person entry (cast/crew)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonEntry {
    pub name: String,
    /// Role from the source, or the `unspecified` sentinel when absent
    pub role: PersonRole,
}

/// Canonical rating entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingEntry {
    /// Canonical rating system name (or the source name on raw pass-through)
    pub system: String,
    pub value: String,
    /// Region scope; `global` when the source does not distinguish regions
    pub region: RatingRegion,
}

/// Normalized, source-agnostic metadata record for one asset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalMetadataRecord {
    /// Source system type identifier from the normalization config
    pub source_type: String,
    /// Canonical title slots, first non-empty source match per slot
    pub titles: BTreeMap<TitleSlot, String>,
    /// Namespaced identifiers, sorted for stable output
    pub identifiers: Vec<NamespacedIdentifier>,
    /// Cast/crew entries in source order
    pub people: Vec<PersonEntry>,
    /// Rating entries in source order
    pub ratings: Vec<RatingEntry>,
    /// Raw source payload, kept only when the config asks for it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_source: Option<String>,
    /// Non-fatal issues recorded during normalization
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub warnings: Vec<String>,
}

impl CanonicalMetadataRecord {
    /// True when no mapping produced any canonical content
    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
            && self.identifiers.is_empty()
            && self.people.is_empty()
            && self.ratings.is_empty()
    }
}

/// Enrichment status persisted alongside the record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentStatus {
    Pending,
    Success,
    Failed,
}

impl EnrichmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrichmentStatus::Pending => "pending",
            EnrichmentStatus::Success => "success",
            EnrichmentStatus::Failed => "failed",
        }
    }
}

/// Status row the record store keeps for every attempted asset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalMetadataStatus {
    pub asset_id: Uuid,
    pub status: EnrichmentStatus,
    /// Classified outcome kind, absent while pending
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome_kind: Option<OutcomeKind>,
    /// Operator-readable diagnostic for failed outcomes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ExternalMetadataStatus {
    pub fn pending(asset_id: Uuid) -> Self {
        Self {
            asset_id,
            status: EnrichmentStatus::Pending,
            outcome_kind: None,
            diagnostic: None,
            updated_at: Utc::now(),
        }
    }
}
