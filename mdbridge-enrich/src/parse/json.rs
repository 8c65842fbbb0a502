//! JSON payload parsing
//!
//! Objects map to trees, arrays to sequences, scalars directly.

use std::collections::BTreeMap;

use crate::types::{GenericNode, ParseError, ScalarValue};

/// Parse a JSON document into a generic tree
pub fn parse_json(raw_body: &str) -> Result<GenericNode, ParseError> {
    let value: serde_json::Value =
        serde_json::from_str(raw_body).map_err(|e| ParseError::Json(e.to_string()))?;
    Ok(convert(value))
}

fn convert(value: serde_json::Value) -> GenericNode {
    match value {
        serde_json::Value::Null => GenericNode::Scalar(ScalarValue::Null),
        serde_json::Value::Bool(b) => GenericNode::Scalar(ScalarValue::Bool(b)),
        serde_json::Value::Number(n) => {
            // f64 covers every JSON number serde_json produces by default
            GenericNode::Scalar(ScalarValue::Number(n.as_f64().unwrap_or(f64::NAN)))
        }
        serde_json::Value::String(s) => GenericNode::Scalar(ScalarValue::String(s)),
        serde_json::Value::Array(items) => {
            GenericNode::Sequence(items.into_iter().map(convert).collect())
        }
        serde_json::Value::Object(entries) => {
            let map: BTreeMap<String, GenericNode> = entries
                .into_iter()
                .map(|(key, value)| (key, convert(value)))
                .collect();
            GenericNode::Tree(map)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_becomes_tree() {
        let tree = parse_json(r#"{"title": "Foo", "asset_id": "X123"}"#).unwrap();
        assert_eq!(
            tree.get_path("title").and_then(GenericNode::as_scalar),
            Some(&ScalarValue::String("Foo".into()))
        );
        assert_eq!(
            tree.get_path("asset_id").and_then(GenericNode::as_scalar),
            Some(&ScalarValue::String("X123".into()))
        );
    }

    #[test]
    fn test_array_becomes_sequence() {
        let tree = parse_json(r#"{"cast": [{"name": "A"}, {"name": "B"}]}"#).unwrap();
        let cast = tree.get_path("cast").unwrap().as_sequence().unwrap();
        assert_eq!(cast.len(), 2);
        assert_eq!(
            cast[1].get_path("name").and_then(GenericNode::as_scalar),
            Some(&ScalarValue::String("B".into()))
        );
    }

    #[test]
    fn test_scalars_map_directly() {
        let tree = parse_json(r#"{"year": 2024, "hd": true, "note": null}"#).unwrap();
        assert_eq!(
            tree.get_path("year").and_then(GenericNode::as_scalar),
            Some(&ScalarValue::Number(2024.0))
        );
        assert_eq!(
            tree.get_path("hd").and_then(GenericNode::as_scalar),
            Some(&ScalarValue::Bool(true))
        );
        assert_eq!(
            tree.get_path("note").and_then(GenericNode::as_scalar),
            Some(&ScalarValue::Null)
        );
    }

    #[test]
    fn test_malformed_json_is_a_parse_error() {
        let result = parse_json("{\"title\": ");
        assert!(matches!(result, Err(ParseError::Json(_))));
    }

    #[test]
    fn test_top_level_scalar_parses() {
        // Structurally valid; the normalizer decides whether it is usable
        let node = parse_json("\"just a string\"").unwrap();
        assert_eq!(
            node.as_scalar(),
            Some(&ScalarValue::String("just a string".into()))
        );
    }
}
