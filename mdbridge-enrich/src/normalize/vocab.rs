//! Canonical target vocabulary
//!
//! Title slots, person roles, and rating regions form closed enumerated
//! sets; mapping tables may only reference these. Identifier namespaces
//! are customer-defined strings and are not enumerated here.

use serde::{Deserialize, Serialize};

/// Canonical title slot
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TitleSlot {
    Primary,
    Secondary,
    Series,
    Episode,
    Description,
}

impl TitleSlot {
    /// Stable wire name, matching the serde representation
    pub fn as_str(&self) -> &'static str {
        match self {
            TitleSlot::Primary => "primary",
            TitleSlot::Secondary => "secondary",
            TitleSlot::Series => "series",
            TitleSlot::Episode => "episode",
            TitleSlot::Description => "description",
        }
    }
}

/// Canonical person role
///
/// `Unspecified` is the sentinel for source entries that carry no role;
/// such entries are kept, never dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonRole {
    Actor,
    Director,
    Producer,
    Writer,
    Composer,
    Editor,
    Unspecified,
}

impl PersonRole {
    /// Parse a source-document role string, case-insensitively
    ///
    /// Unknown role strings return None; the caller decides whether that
    /// becomes the sentinel plus a recorded warning.
    pub fn from_source(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "actor" | "cast" => Some(PersonRole::Actor),
            "director" => Some(PersonRole::Director),
            "producer" => Some(PersonRole::Producer),
            "writer" | "screenwriter" => Some(PersonRole::Writer),
            "composer" => Some(PersonRole::Composer),
            "editor" => Some(PersonRole::Editor),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PersonRole::Actor => "actor",
            PersonRole::Director => "director",
            PersonRole::Producer => "producer",
            PersonRole::Writer => "writer",
            PersonRole::Composer => "composer",
            PersonRole::Editor => "editor",
            PersonRole::Unspecified => "unspecified",
        }
    }
}

/// Canonical rating region
///
/// `Global` covers sources that do not distinguish regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingRegion {
    Us,
    Gb,
    De,
    Fr,
    Jp,
    Au,
    Global,
}

impl RatingRegion {
    /// Parse a source-document region string, case-insensitively
    pub fn from_source(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "us" | "usa" => Some(RatingRegion::Us),
            "gb" | "uk" => Some(RatingRegion::Gb),
            "de" => Some(RatingRegion::De),
            "fr" => Some(RatingRegion::Fr),
            "jp" => Some(RatingRegion::Jp),
            "au" => Some(RatingRegion::Au),
            "global" | "world" => Some(RatingRegion::Global),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RatingRegion::Us => "us",
            RatingRegion::Gb => "gb",
            RatingRegion::De => "de",
            RatingRegion::Fr => "fr",
            RatingRegion::Jp => "jp",
            RatingRegion::Au => "au",
            RatingRegion::Global => "global",
        }
    }
}
