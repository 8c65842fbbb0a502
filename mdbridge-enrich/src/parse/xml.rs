//! XML payload parsing
//!
//! Elements map to trees keyed by tag name; repeated sibling tags become
//! a sequence; attributes become `@`-prefixed entries so the attribute
//! vs. element distinction survives into field mapping; text content of
//! a leaf element becomes its scalar value, or a `#text` entry when the
//! element also carries attributes or children.

use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::BTreeMap;

use crate::types::{GenericNode, ParseError, ScalarValue, ATTRIBUTE_PREFIX, TEXT_KEY};

/// One open element while reading
struct Frame {
    name: String,
    map: BTreeMap<String, GenericNode>,
    text: String,
}

impl Frame {
    fn new(name: String) -> Self {
        Self {
            name,
            map: BTreeMap::new(),
            text: String::new(),
        }
    }

    /// Close this element into a generic node
    fn into_node(self) -> GenericNode {
        let text = self.text.trim();
        if self.map.is_empty() {
            if text.is_empty() {
                // <empty/> carries no value
                GenericNode::Scalar(ScalarValue::Null)
            } else {
                GenericNode::Scalar(ScalarValue::String(text.to_string()))
            }
        } else {
            let mut map = self.map;
            if !text.is_empty() {
                map.insert(
                    TEXT_KEY.to_string(),
                    GenericNode::Scalar(ScalarValue::String(text.to_string())),
                );
            }
            GenericNode::Tree(map)
        }
    }
}

/// Parse an XML document into a generic tree
///
/// The returned tree has one entry keyed by the root element's tag name.
pub fn parse_xml(raw_body: &str) -> Result<GenericNode, ParseError> {
    let mut reader = Reader::from_str(raw_body);

    // Synthetic root frame collects the document element
    let mut stack: Vec<Frame> = vec![Frame::new(String::new())];

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                let mut frame = Frame::new(tag_name(start.name().as_ref()));
                read_attributes(&start, &mut frame)?;
                stack.push(frame);
            }
            Ok(Event::Empty(start)) => {
                let mut frame = Frame::new(tag_name(start.name().as_ref()));
                read_attributes(&start, &mut frame)?;
                let name = frame.name.clone();
                let node = frame.into_node();
                insert_child(current(&mut stack), name, node);
            }
            Ok(Event::Text(text)) => {
                let unescaped = text
                    .unescape()
                    .map_err(|e| ParseError::Xml(e.to_string()))?;
                current(&mut stack).text.push_str(&unescaped);
            }
            Ok(Event::CData(cdata)) => {
                let raw = String::from_utf8_lossy(cdata.as_ref()).into_owned();
                current(&mut stack).text.push_str(&raw);
            }
            Ok(Event::End(_)) => {
                // quick-xml validates end-tag names, so the synthetic root
                // always remains below the closing element
                let frame = match stack.pop() {
                    Some(frame) if !stack.is_empty() => frame,
                    _ => return Err(ParseError::Xml("unexpected closing tag".to_string())),
                };
                let name = frame.name.clone();
                let node = frame.into_node();
                insert_child(current(&mut stack), name, node);
            }
            Ok(Event::Eof) => break,
            // Declarations, comments, processing instructions, doctypes
            Ok(_) => {}
            Err(e) => {
                return Err(ParseError::Xml(format!(
                    "at byte {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
        }
    }

    if stack.len() != 1 {
        return Err(ParseError::Xml("unclosed element at end of input".to_string()));
    }
    let root = stack.pop().expect("synthetic root frame remains");
    if root.map.is_empty() {
        return Err(ParseError::Xml("document has no root element".to_string()));
    }
    Ok(GenericNode::Tree(root.map))
}

fn current(stack: &mut [Frame]) -> &mut Frame {
    stack.last_mut().expect("stack never empties before Eof")
}

fn tag_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

/// Attributes become `@`-prefixed scalar entries on the element's tree
fn read_attributes(
    start: &quick_xml::events::BytesStart<'_>,
    frame: &mut Frame,
) -> Result<(), ParseError> {
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| ParseError::Xml(e.to_string()))?;
        let key = format!(
            "{}{}",
            ATTRIBUTE_PREFIX,
            String::from_utf8_lossy(attribute.key.as_ref())
        );
        let value = attribute
            .unescape_value()
            .map_err(|e| ParseError::Xml(e.to_string()))?
            .into_owned();
        frame
            .map
            .insert(key, GenericNode::Scalar(ScalarValue::String(value)));
    }
    Ok(())
}

/// Insert a closed child, collapsing repeated sibling tags into a sequence
fn insert_child(parent: &mut Frame, name: String, node: GenericNode) {
    match parent.map.remove(&name) {
        None => {
            parent.map.insert(name, node);
        }
        Some(GenericNode::Sequence(mut items)) => {
            items.push(node);
            parent.map.insert(name, GenericNode::Sequence(items));
        }
        Some(existing) => {
            parent
                .map
                .insert(name, GenericNode::Sequence(vec![existing, node]));
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
