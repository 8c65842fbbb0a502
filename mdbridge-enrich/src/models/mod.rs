//! Data models for mdbridge-enrich

pub mod record;

pub use record::{
    CanonicalMetadataRecord, EnrichmentStatus, ExternalMetadataStatus, NamespacedIdentifier,
    PersonEntry, RatingEntry,
};
