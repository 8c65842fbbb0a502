//! Field mapping engine (normalizer)
//!
//! Applies a declarative [`NormalizationConfig`] to project a parsed
//! generic tree into the canonical metadata record.
//!
//! The engine is resilient to partially malformed source documents and
//! always returns a best-effort record:
//! - a field absent in the source tree is a soft miss (no warning);
//! - a field present but failing type coercion (e.g. expected scalar,
//!   found a sequence) is a recorded warning, never a failure;
//! - only a fundamentally unusable tree (top-level scalar where mappings
//!   were required) is a `NormalizeError`.

pub mod config;
pub mod vocab;

use tracing::debug;

use crate::models::record::{
    CanonicalMetadataRecord, NamespacedIdentifier, PersonEntry, RatingEntry,
};
use crate::normalize::config::NormalizationConfig;
use crate::normalize::vocab::{PersonRole, RatingRegion};
use crate::types::{GenericNode, NormalizeError, ScalarValue};

/// Project a generic tree into the canonical record
///
/// `raw_body` is the unparsed source payload, attached to the record when
/// the config's `include_raw_source` flag is set.
pub fn normalize(
    tree: &GenericNode,
    config: &NormalizationConfig,
    raw_body: &str,
) -> Result<CanonicalMetadataRecord, NormalizeError> {
    if matches!(tree, GenericNode::Scalar(_)) && !config.has_no_mappings() {
        return Err(NormalizeError::UnusableTree(
            "top-level scalar cannot satisfy any field mapping".to_string(),
        ));
    }

    let mut record = CanonicalMetadataRecord {
        source_type: config.source_type.clone(),
        ..Default::default()
    };
    let mut warnings: Vec<String> = Vec::new();

    map_identifiers(tree, config, &mut record, &mut warnings);
    map_titles(tree, config, &mut record, &mut warnings);
    map_people(tree, config, &mut record, &mut warnings);
    map_ratings(tree, config, &mut record, &mut warnings);

    if config.include_raw_source {
        record.raw_source = Some(raw_body.to_string());
    }
    record.warnings = warnings;

    debug!(
        source_type = %record.source_type,
        titles = record.titles.len(),
        identifiers = record.identifiers.len(),
        people = record.people.len(),
        ratings = record.ratings.len(),
        warnings = record.warnings.len(),
        "Normalization complete"
    );
    Ok(record)
}

/// Render a node as a scalar string
///
/// `Ok(None)` for an absent value (null scalar); `Err` names the wrong
/// shape for the warning text.
fn scalar_string(node: &GenericNode) -> Result<Option<String>, &'static str> {
    match node {
        GenericNode::Scalar(ScalarValue::Null) => Ok(None),
        GenericNode::Scalar(value) => Ok(Some(value.to_string())),
        GenericNode::Sequence(_) => Err("sequence"),
        GenericNode::Tree(_) => Err("tree"),
    }
}

fn map_identifiers(
    tree: &GenericNode,
    config: &NormalizationConfig,
    record: &mut CanonicalMetadataRecord,
    warnings: &mut Vec<String>,
) {
    for mapping in &config.identifiers {
        let Some(node) = tree.get_path(&mapping.source_path) else {
            continue; // soft miss
        };
        match scalar_string(node) {
            Ok(Some(value)) if !value.is_empty() => {
                let namespace = mapping
                    .namespace
                    .clone()
                    .unwrap_or_else(|| config.identifier_namespace.clone());
                record
                    .identifiers
                    .push(NamespacedIdentifier { namespace, value });
            }
            Ok(_) => {}
            Err(shape) => warnings.push(format!(
                "identifier mapping '{}': expected scalar, found {}",
                mapping.source_path, shape
            )),
        }
    }
    // Stable output regardless of mapping order
    record.identifiers.sort();
    record.identifiers.dedup();
}

fn map_titles(
    tree: &GenericNode,
    config: &NormalizationConfig,
    record: &mut CanonicalMetadataRecord,
    warnings: &mut Vec<String>,
) {
    for mapping in &config.titles {
        if record.titles.contains_key(&mapping.slot) {
            continue; // first non-empty match per slot wins
        }
        for source_path in &mapping.source_paths {
            let Some(node) = tree.get_path(source_path) else {
                continue; // soft miss, try the next source path
            };
            match scalar_string(node) {
                Ok(Some(value)) if !value.is_empty() => {
                    record.titles.insert(mapping.slot, value);
                    break;
                }
                Ok(_) => {}
                Err(shape) => warnings.push(format!(
                    "title mapping '{}' for slot '{}': expected scalar, found {}",
                    source_path,
                    mapping.slot.as_str(),
                    shape
                )),
            }
        }
    }
}

fn map_people(
    tree: &GenericNode,
    config: &NormalizationConfig,
    record: &mut CanonicalMetadataRecord,
    warnings: &mut Vec<String>,
) {
    for mapping in &config.people {
        let Some(node) = tree.get_path(&mapping.source_path) else {
            continue; // soft miss
        };

        // A single structure is treated as a one-entry sequence; XML
        // collapses a lone child element to exactly that shape.
        let entries: Vec<&GenericNode> = match node {
            GenericNode::Sequence(items) => items.iter().collect(),
            other => vec![other],
        };

        for entry in entries {
            match entry {
                // Bare scalar entry: a name with no role information
                GenericNode::Scalar(ScalarValue::Null) => {}
                GenericNode::Scalar(value) => {
                    let name = value.to_string();
                    if !name.is_empty() {
                        record.people.push(PersonEntry {
                            name,
                            role: PersonRole::Unspecified,
                        });
                    }
                }
                GenericNode::Tree(_) => {
                    let name = match entry.get_path(&mapping.name_field).map(scalar_string) {
                        Some(Ok(Some(name))) if !name.is_empty() => name,
                        Some(Err(shape)) => {
                            warnings.push(format!(
                                "people mapping '{}': name field '{}' expected scalar, found {}",
                                mapping.source_path, mapping.name_field, shape
                            ));
                            continue;
                        }
                        _ => {
                            warnings.push(format!(
                                "people mapping '{}': entry without a usable '{}' field",
                                mapping.source_path, mapping.name_field
                            ));
                            continue;
                        }
                    };

                    // Missing role defaults to the sentinel, never dropped
                    let role = match mapping.role_field.as_deref() {
                        Some(role_field) => match entry.get_path(role_field).map(scalar_string) {
                            Some(Ok(Some(raw_role))) => match PersonRole::from_source(&raw_role) {
                                Some(role) => role,
                                None => {
                                    warnings.push(format!(
                                        "people mapping '{}': unknown role '{}', kept as unspecified",
                                        mapping.source_path, raw_role
                                    ));
                                    PersonRole::Unspecified
                                }
                            },
                            Some(Err(shape)) => {
                                warnings.push(format!(
                                    "people mapping '{}': role field '{}' expected scalar, found {}",
                                    mapping.source_path, role_field, shape
                                ));
                                PersonRole::Unspecified
                            }
                            _ => PersonRole::Unspecified,
                        },
                        None => PersonRole::Unspecified,
                    };

                    record.people.push(PersonEntry { name, role });
                }
                GenericNode::Sequence(_) => warnings.push(format!(
                    "people mapping '{}': nested sequence entry is not a person structure",
                    mapping.source_path
                )),
            }
        }
    }
}

fn map_ratings(
    tree: &GenericNode,
    config: &NormalizationConfig,
    record: &mut CanonicalMetadataRecord,
    warnings: &mut Vec<String>,
) {
    for mapping in &config.ratings {
        let Some(node) = tree.get_path(&mapping.source_path) else {
            continue; // soft miss
        };

        let entries: Vec<&GenericNode> = match node {
            GenericNode::Sequence(items) => items.iter().collect(),
            other => vec![other],
        };

        for entry in entries {
            if entry.as_tree().is_none() {
                warnings.push(format!(
                    "rating mapping '{}': expected rating structure, found scalar or sequence",
                    mapping.source_path
                ));
                continue;
            }

            let system = match entry.get_path(&mapping.system_field).map(scalar_string) {
                Some(Ok(Some(system))) if !system.is_empty() => system,
                _ => {
                    warnings.push(format!(
                        "rating mapping '{}': entry without a usable '{}' field",
                        mapping.source_path, mapping.system_field
                    ));
                    continue;
                }
            };
            let value = match entry.get_path(&mapping.value_field).map(scalar_string) {
                Some(Ok(Some(value))) if !value.is_empty() => value,
                _ => {
                    warnings.push(format!(
                        "rating mapping '{}': entry without a usable '{}' field",
                        mapping.source_path, mapping.value_field
                    ));
                    continue;
                }
            };

            let region = match mapping.region_field.as_deref() {
                Some(region_field) => match entry.get_path(region_field).map(scalar_string) {
                    Some(Ok(Some(raw_region))) => match RatingRegion::from_source(&raw_region) {
                        Some(region) => region,
                        None => {
                            warnings.push(format!(
                                "rating mapping '{}': unknown region '{}', kept as global",
                                mapping.source_path, raw_region
                            ));
                            RatingRegion::Global
                        }
                    },
                    _ => RatingRegion::Global,
                },
                None => RatingRegion::Global,
            };

            match mapping.systems.get(&system) {
                Some(canonical) => record.ratings.push(RatingEntry {
                    system: canonical.clone(),
                    value,
                    region,
                }),
                // Unmapped systems pass through only alongside the raw
                // source; otherwise dropped with a recorded warning
                None if config.include_raw_source => record.ratings.push(RatingEntry {
                    system,
                    value,
                    region,
                }),
                None => warnings.push(format!(
                    "rating mapping '{}': unmapped rating system '{}' dropped",
                    mapping.source_path, system
                )),
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
