// 🌳 Raw Markup Tree
// Turns the VASSAL buildFile into a dynamic tree and normalizes child shapes
//
// Layout of the tree:
// - attributes live under "@name"
// - element text lives under "#text" (or the element IS the string when it has
//   no attributes and no children)
// - a child tag seen once is a single value, seen repeatedly is an array
//
// Because a container can be absent, single, or repeated, every descent goes
// through `as_sequence`.

use crate::error::ConvertResult;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::{Map, Value};

// ============================================================================
// PARSING
// ============================================================================

struct OpenElement {
    name: String,
    fields: Map<String, Value>,
    text: String,
}

impl OpenElement {
    fn open(start: &BytesStart<'_>) -> ConvertResult<Self> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut fields = Map::new();

        for attr in start.attributes() {
            let attr = attr?;
            let key = format!("@{}", String::from_utf8_lossy(attr.key.as_ref()));
            let value = attr.unescape_value()?.into_owned();
            fields.insert(key, Value::String(value));
        }

        Ok(OpenElement {
            name,
            fields,
            text: String::new(),
        })
    }

    fn finish(mut self) -> (String, Value) {
        let value = if self.fields.is_empty() {
            if self.text.is_empty() {
                Value::Null
            } else {
                Value::String(self.text)
            }
        } else {
            if !self.text.is_empty() {
                self.fields.insert("#text".to_string(), Value::String(self.text));
            }
            Value::Object(self.fields)
        };

        (self.name, value)
    }
}

/// Parse an XML document into a dynamic tree rooted at `{ <root tag>: ... }`
pub fn parse_document(xml: &str) -> ConvertResult<Value> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<OpenElement> = Vec::new();
    let mut root = Map::new();

    loop {
        match reader.read_event()? {
            Event::Start(start) => stack.push(OpenElement::open(&start)?),
            Event::Empty(start) => {
                let (name, value) = OpenElement::open(&start)?.finish();
                attach(&mut stack, &mut root, name, value);
            }
            Event::End(_) => {
                if let Some(element) = stack.pop() {
                    let (name, value) = element.finish();
                    attach(&mut stack, &mut root, name, value);
                }
            }
            Event::Text(text) => {
                if let Some(element) = stack.last_mut() {
                    element.text.push_str(&text.unescape()?);
                }
            }
            Event::CData(data) => {
                if let Some(element) = stack.last_mut() {
                    element.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(Value::Object(root))
}

fn attach(stack: &mut [OpenElement], root: &mut Map<String, Value>, name: String, value: Value) {
    let fields = match stack.last_mut() {
        Some(parent) => &mut parent.fields,
        None => root,
    };

    match fields.get_mut(&name) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            fields.insert(name, value);
        }
    }
}

// ============================================================================
// SHAPE NORMALIZATION
// ============================================================================

/// Absent → empty, single → one element, sequence → as-is
pub fn as_sequence(value: Option<&Value>) -> Vec<&Value> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().collect(),
        Some(single) => vec![single],
    }
}

/// Children of `node` stored under `tag`, normalized to a sequence
pub fn children<'a>(node: &'a Value, tag: &str) -> Vec<&'a Value> {
    as_sequence(node.get(tag))
}

/// Whether `node` carries a container under `tag` at all
pub fn has_container(node: &Value, tag: &str) -> bool {
    !matches!(node.get(tag), None | Some(Value::Null))
}

/// Attribute value, e.g. `attribute(node, "entryName")`
pub fn attribute<'a>(node: &'a Value, name: &str) -> Option<&'a str> {
    node.get(format!("@{}", name)).and_then(Value::as_str)
}

/// Element text; empty when the element has none
pub fn text(node: &Value) -> &str {
    match node {
        Value::String(s) => s,
        _ => node.get("#text").and_then(Value::as_str).unwrap_or(""),
    }
}

// ============================================================================
// TESTS
// ============================================================================
