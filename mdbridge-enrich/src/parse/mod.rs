//! Response parsing
//!
//! Converts raw JSON or XML bytes into the format-agnostic generic tree
//! consumed by the field mapping engine. The payload format is declared
//! by configuration and never content-sniffed.

pub mod json;
pub mod xml;

use crate::types::{GenericNode, ParseError, ResponseFormat};

/// Parse a raw response body in its declared format
///
/// # Errors
/// Malformed input of the declared format is a `ParseError`, surfaced by
/// the classifier as a generic Error outcome.
pub fn parse(raw_body: &str, format: ResponseFormat) -> Result<GenericNode, ParseError> {
    match format {
        ResponseFormat::Json => json::parse_json(raw_body),
        ResponseFormat::Xml => xml::parse_xml(raw_body),
    }
}
