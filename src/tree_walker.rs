// 🗂️ Tree Walker
// Nested name → name → ... → record export, at whatever depth the parser produced

use crate::hierarchy::{HierarchyNode, Leaf};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use serde_json::{json, Map, Value};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

// ============================================================================
// LEAF RECORD
// ============================================================================

/// What a leaf looks like in the exported documents
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LeafRecord {
    pub front_png: Option<String>,
    pub front_png_url: Option<String>,
    pub back_png: Option<String>,
    pub back_png_url: Option<String>,
}

pub const RECORD_FIELDS: [&str; 4] = ["front_png", "front_png_url", "back_png", "back_png_url"];

impl From<&Leaf> for LeafRecord {
    fn from(leaf: &Leaf) -> Self {
        LeafRecord {
            front_png: leaf.front_png.clone(),
            front_png_url: leaf.front_png_url.clone(),
            back_png: leaf.back_png.clone(),
            back_png_url: leaf.back_png_url.clone(),
        }
    }
}

/// An object carrying exactly the four record fields
pub fn is_leaf_record(value: &Value) -> bool {
    match value.as_object() {
        Some(map) => map.len() == RECORD_FIELDS.len() && RECORD_FIELDS.iter().all(|f| map.contains_key(*f)),
        None => false,
    }
}

// ============================================================================
// FLATTEN
// ============================================================================

/// Nested mapping keyed by display name at every level
///
/// Sibling name collisions keep the position of the first and the value of
/// the last.
pub fn flatten(roots: &[HierarchyNode]) -> Map<String, Value> {
    let mut out = Map::new();
    for node in roots {
        out.insert(node.name().to_string(), flatten_node(node));
    }
    out
}

fn flatten_node(node: &HierarchyNode) -> Value {
    match node {
        HierarchyNode::Group(group) => Value::Object(flatten(&group.children)),
        HierarchyNode::Leaf(leaf) => json!({
            "front_png": leaf.front_png,
            "front_png_url": leaf.front_png_url,
            "back_png": leaf.back_png,
            "back_png_url": leaf.back_png_url,
        }),
    }
}

/// Every leaf with the names of its ancestors, depth-first
pub fn flat_leaves(roots: &[HierarchyNode]) -> Vec<(Vec<String>, &Leaf)> {
    let mut out = Vec::new();
    let mut path = Vec::new();
    for node in roots {
        walk(node, &mut path, &mut out);
    }
    out
}

fn walk<'a>(node: &'a HierarchyNode, path: &mut Vec<String>, out: &mut Vec<(Vec<String>, &'a Leaf)>) {
    match node {
        HierarchyNode::Leaf(leaf) => out.push((path.clone(), leaf)),
        HierarchyNode::Group(group) => {
            path.push(group.name.clone());
            for child in &group.children {
                walk(child, path, out);
            }
            path.pop();
        }
    }
}

// ============================================================================
// READ BACK
// ============================================================================

/// Leaf records of a flattened document, keyed by leaf name
pub fn read_flattened(document: &Map<String, Value>) -> Vec<(String, LeafRecord)> {
    let mut out = Vec::new();
    collect_records(document, &mut out);
    out
}

fn collect_records(map: &Map<String, Value>, out: &mut Vec<(String, LeafRecord)>) {
    for (name, value) in map {
        if is_leaf_record(value) {
            if let Ok(record) = serde_json::from_value::<LeafRecord>(value.clone()) {
                out.push((name.clone(), record));
            }
        } else if let Some(nested) = value.as_object() {
            collect_records(nested, out);
        }
    }
}

// ============================================================================
// FILE OUTPUT
// ============================================================================

/// Pretty JSON with four-space indentation
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let mut serializer = serde_json::Serializer::with_formatter(&mut writer, PrettyFormatter::with_indent(b"    "));

    value
        .serialize(&mut serializer)
        .with_context(|| format!("Failed to write JSON to {}", path.display()))?;
    writer.flush()?;
    Ok(())
}

pub fn read_json_map(path: &Path) -> Result<Map<String, Value>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    serde_json::from_reader(std::io::BufReader::new(file))
        .with_context(|| format!("Failed to parse {} as a JSON object", path.display()))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::{Group, NodeKind};
    use serde_json::json;
    use std::collections::HashSet;

    fn unit(name: &str, front: &str, url: Option<&str>) -> HierarchyNode {
        HierarchyNode::Leaf(Leaf {
            kind: NodeKind::Unit,
            name: name.to_string(),
            front_png: Some(front.to_string()),
            front_png_url: url.map(String::from),
            back_png: None,
            back_png_url: None,
        })
    }

    fn group(kind: NodeKind, name: &str, children: Vec<HierarchyNode>) -> HierarchyNode {
        HierarchyNode::Group(Group {
            kind,
            name: name.to_string(),
            children,
        })
    }

    fn sample_tree() -> Vec<HierarchyNode> {
        vec![group(
            NodeKind::Faction,
            "NATO",
            vec![group(
                NodeKind::Nation,
                "US",
                vec![group(
                    NodeKind::Command,
                    "V Corps",
                    vec![
                        group(
                            NodeKind::Command,
                            "3 AD",
                            vec![group(
                                NodeKind::Command,
                                "1 Bde",
                                vec![unit("1-32 Armor", "a.png", Some("http://x/a"))],
                            )],
                        ),
                        unit("V Corps HQ", "hq.png", None),
                    ],
                )],
            )],
        )]
    }

    #[test]
    fn test_flatten_keeps_every_level() {
        let flat = Value::Object(flatten(&sample_tree()));

        assert_eq!(
            flat["NATO"]["US"]["V Corps"]["3 AD"]["1 Bde"]["1-32 Armor"],
            json!({
                "front_png": "a.png",
                "front_png_url": "http://x/a",
                "back_png": null,
                "back_png_url": null,
            })
        );
        assert_eq!(flat["NATO"]["US"]["V Corps"]["V Corps HQ"]["front_png_url"], Value::Null);
    }

    #[test]
    fn test_flattened_leaf_is_its_record() {
        let tree = sample_tree();
        let flat = Value::Object(flatten(&tree));

        for (path, leaf) in flat_leaves(&tree) {
            let mut value = &flat;
            for name in path.iter().chain(std::iter::once(&leaf.name)) {
                value = &value[name.as_str()];
            }

            assert!(is_leaf_record(value), "{:?}", path);
            let record: LeafRecord = serde_json::from_value(value.clone()).unwrap();
            assert_eq!(record, LeafRecord::from(leaf));
        }
    }

    #[test]
    fn test_flatten_then_read_recovers_leaves() {
        let tree = sample_tree();
        let flat = flatten(&tree);

        let expected: HashSet<(String, Option<String>)> = flat_leaves(&tree)
            .into_iter()
            .map(|(_, leaf)| (leaf.name.clone(), leaf.front_png_url.clone()))
            .collect();
        let recovered: HashSet<(String, Option<String>)> = read_flattened(&flat)
            .into_iter()
            .map(|(name, record)| (name, record.front_png_url))
            .collect();

        assert_eq!(expected, recovered);
        assert_eq!(recovered.len(), 2);
    }

    #[test]
    fn test_flat_leaves_carry_paths() {
        let tree = sample_tree();
        let leaves = flat_leaves(&tree);

        assert_eq!(leaves[0].0, vec!["NATO", "US", "V Corps", "3 AD", "1 Bde"]);
        assert_eq!(leaves[1].0, vec!["NATO", "US", "V Corps"]);
    }

    #[test]
    fn test_duplicate_names_overwrite() {
        let tree = vec![group(
            NodeKind::Deck,
            "NATO Cards",
            vec![unit("Strike", "1.png", None), unit("Strike", "2.png", None)],
        )];

        let flat = Value::Object(flatten(&tree));
        assert_eq!(flat["NATO Cards"]["Strike"]["front_png"], json!("2.png"));
    }

    #[test]
    fn test_is_leaf_record() {
        assert!(is_leaf_record(&json!({
            "front_png": "a", "front_png_url": null, "back_png": null, "back_png_url": null
        })));
        assert!(!is_leaf_record(&json!({"front_png": "a"})));
        assert!(!is_leaf_record(&json!("a")));
    }
}
