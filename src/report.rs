// 📋 Conversion Report
// Leaf counts per kind and the references the association table could not resolve

use crate::hierarchy::{HierarchyNode, Leaf, NodeKind, ParsedModule};
use crate::tree_walker::flat_leaves;
use std::collections::BTreeMap;

/// A leaf whose front or back ref had no entry in the association table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedLeaf {
    /// Ancestor names, then the leaf name, joined with " / "
    pub path: String,
    pub missing_front: bool,
    pub missing_back: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionReport {
    pub leaves_by_kind: BTreeMap<&'static str, usize>,
    pub unresolved: Vec<UnresolvedLeaf>,
}

impl ConversionReport {
    pub fn from_module(module: &ParsedModule) -> Self {
        let mut report = ConversionReport::default();
        report.add_roots(&module.factions);
        report.add_roots(&module.deck_nodes());
        report.add_roots(&module.marker_nodes());
        report
    }

    fn add_roots(&mut self, roots: &[HierarchyNode]) {
        for (ancestors, leaf) in flat_leaves(roots) {
            *self.leaves_by_kind.entry(leaf.kind.name()).or_insert(0) += 1;

            if let Some(unresolved) = unresolved_leaf(&ancestors, leaf) {
                self.unresolved.push(unresolved);
            }
        }
    }

    pub fn leaf_count(&self, kind: NodeKind) -> usize {
        self.leaves_by_kind.get(kind.name()).copied().unwrap_or(0)
    }

    pub fn total_leaves(&self) -> usize {
        self.leaves_by_kind.values().sum()
    }

    pub fn summary(&self) -> String {
        let counts: Vec<String> = self
            .leaves_by_kind
            .iter()
            .map(|(kind, count)| format!("{} {}s", count, kind.to_lowercase()))
            .collect();

        format!(
            "{} leaves ({}) | {} with unresolved images",
            self.total_leaves(),
            counts.join(", "),
            self.unresolved.len()
        )
    }
}

/// A ref that exists but has no locator. Absent refs are not unresolved.
fn unresolved_leaf(ancestors: &[String], leaf: &Leaf) -> Option<UnresolvedLeaf> {
    let missing_front = leaf.front_png.is_some() && leaf.front_png_url.is_none();
    let missing_back = leaf.back_png.is_some() && leaf.back_png_url.is_none();

    if !missing_front && !missing_back {
        return None;
    }

    let mut path = ancestors.to_vec();
    path.push(leaf.name.clone());
    Some(UnresolvedLeaf {
        path: path.join(" / "),
        missing_front,
        missing_back,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::{Deck, DeckSide, Group};

    fn leaf(kind: NodeKind, name: &str, front_url: Option<&str>, back: Option<&str>) -> Leaf {
        Leaf {
            kind,
            name: name.to_string(),
            front_png: Some(format!("{}.png", name)),
            front_png_url: front_url.map(str::to_string),
            back_png: back.map(str::to_string),
            back_png_url: None,
        }
    }

    #[test]
    fn test_report_counts_kinds_and_unresolved() {
        let module = ParsedModule {
            factions: vec![HierarchyNode::Group(Group {
                kind: NodeKind::Faction,
                name: "NATO".to_string(),
                children: vec![
                    HierarchyNode::Leaf(leaf(NodeKind::Unit, "tank", Some("http://x/1"), None)),
                    HierarchyNode::Leaf(leaf(NodeKind::Unit, "inf", None, None)),
                ],
            })],
            decks: vec![Deck {
                name: "NATO Cards".to_string(),
                side: Some(DeckSide::Nato),
                cards: vec![leaf(NodeKind::Card, "c1", Some("http://x/2"), Some("NATO_Card_Back.png"))],
            }],
            marker_categories: vec![],
        };

        let report = ConversionReport::from_module(&module);

        assert_eq!(report.leaf_count(NodeKind::Unit), 2);
        assert_eq!(report.leaf_count(NodeKind::Card), 1);
        assert_eq!(report.leaf_count(NodeKind::Marker), 0);
        assert_eq!(report.total_leaves(), 3);

        assert_eq!(report.unresolved.len(), 2);
        assert_eq!(report.unresolved[0].path, "NATO / inf");
        assert!(report.unresolved[0].missing_front);
        assert!(!report.unresolved[0].missing_back);
        assert_eq!(report.unresolved[1].path, "NATO Cards / c1");
        assert!(report.unresolved[1].missing_back);
    }

    #[test]
    fn test_absent_back_ref_is_not_unresolved() {
        let l = leaf(NodeKind::Unit, "tank", Some("http://x/1"), None);
        assert_eq!(unresolved_leaf(&[], &l), None);
    }
}
