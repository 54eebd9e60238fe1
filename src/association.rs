// 🔗 Association Resolver
// Maps raw image filenames to cloud URLs using the CloudInfo table

use crate::error::ConvertResult;
use bson::{Bson, Document};
use serde::{Deserialize, Serialize};
use std::io::Read;
use tracing::debug;

// ============================================================================
// ASSOCIATION ENTRY
// ============================================================================

/// One uploaded asset: the original filename and where it now lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationEntry {
    pub name: String,
    pub locator: String,
}

impl AssociationEntry {
    pub fn new(name: impl Into<String>, locator: impl Into<String>) -> Self {
        AssociationEntry {
            name: name.into(),
            locator: locator.into(),
        }
    }
}

// ============================================================================
// RESOLVED LOCATORS
// ============================================================================

/// Result of a lookup. `None` means unresolved, never "not asked for".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedLocators {
    pub primary: Option<String>,
    pub secondary: Option<String>,
}

// ============================================================================
// ASSOCIATION TABLE
// ============================================================================

/// Opaque key → entry, kept in source order.
///
/// Order matters: duplicate names resolve to the first entry in the table.
#[derive(Debug, Clone, Default)]
pub struct AssociationTable {
    entries: Vec<(String, AssociationEntry)>,
}

impl AssociationTable {
    pub fn new() -> Self {
        AssociationTable { entries: Vec::new() }
    }

    /// Build a table from (key, entry) pairs, keeping their order
    pub fn from_entries<K: Into<String>>(entries: impl IntoIterator<Item = (K, AssociationEntry)>) -> Self {
        AssociationTable {
            entries: entries.into_iter().map(|(k, e)| (k.into(), e)).collect(),
        }
    }

    /// Decode a CloudInfo BSON document
    ///
    /// Expected layout: `{ "<id>": { "Name": "...", "URL": "...", ... }, ... }`.
    /// Entries without a string `Name` and `URL` are skipped.
    pub fn from_bson_reader<R: Read>(mut reader: R) -> ConvertResult<Self> {
        let document = Document::from_reader(&mut reader)?;
        Ok(Self::from_document(&document))
    }

    pub fn from_bson_bytes(bytes: &[u8]) -> ConvertResult<Self> {
        Self::from_bson_reader(bytes)
    }

    pub fn from_document(document: &Document) -> Self {
        let mut entries = Vec::with_capacity(document.len());

        for (key, value) in document {
            let Bson::Document(details) = value else {
                debug!("skipping association '{}': not a document", key);
                continue;
            };

            match (details.get_str("Name"), details.get_str("URL")) {
                (Ok(name), Ok(url)) => {
                    entries.push((key.clone(), AssociationEntry::new(name, url)));
                }
                _ => debug!("skipping association '{}': missing Name or URL", key),
            }
        }

        AssociationTable { entries }
    }

    pub fn push(&mut self, key: impl Into<String>, entry: AssociationEntry) {
        self.entries.push((key.into(), entry));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, AssociationEntry)> {
        self.entries.iter()
    }

    /// Resolve a front (and optional back) filename to locators
    ///
    /// Scans in table order and stops as soon as the front is resolved and the
    /// back is either resolved or was never requested.
    pub fn resolve(&self, primary: &str, secondary: Option<&str>) -> ResolvedLocators {
        let mut resolved = ResolvedLocators::default();

        for (_, entry) in &self.entries {
            if resolved.primary.is_none() && entry.name == primary {
                resolved.primary = Some(entry.locator.clone());
            }

            if let Some(back) = secondary {
                if resolved.secondary.is_none() && entry.name == back {
                    resolved.secondary = Some(entry.locator.clone());
                }
            }

            if resolved.primary.is_some() && (secondary.is_none() || resolved.secondary.is_some()) {
                break;
            }
        }

        resolved
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn sample_table() -> AssociationTable {
        AssociationTable::from_entries(vec![
            ("k1", AssociationEntry::new("tank.png", "http://x/1")),
            ("k2", AssociationEntry::new("tank_back.png", "http://x/2")),
            ("k3", AssociationEntry::new("tank.png", "http://x/dup")),
        ])
    }

    #[test]
    fn test_resolves_front_and_back() {
        let table = sample_table();
        let resolved = table.resolve("tank.png", Some("tank_back.png"));

        assert_eq!(resolved.primary.as_deref(), Some("http://x/1"));
        assert_eq!(resolved.secondary.as_deref(), Some("http://x/2"));
    }

    #[test]
    fn test_first_match_wins_on_duplicate_names() {
        let table = sample_table();
        let resolved = table.resolve("tank.png", None);

        assert_eq!(resolved.primary.as_deref(), Some("http://x/1"));
    }

    #[test]
    fn test_absent_secondary_is_never_resolved() {
        let table = sample_table();
        let resolved = table.resolve("tank.png", None);

        assert_eq!(resolved.secondary, None);
    }

    #[test]
    fn test_unresolved_refs_stay_none() {
        let table = sample_table();
        let resolved = table.resolve("missing.png", Some("also_missing.png"));

        assert_eq!(resolved, ResolvedLocators::default());
    }

    #[test]
    fn test_back_resolved_even_when_front_is_missing() {
        let table = sample_table();
        let resolved = table.resolve("missing.png", Some("tank_back.png"));

        assert_eq!(resolved.primary, None);
        assert_eq!(resolved.secondary.as_deref(), Some("http://x/2"));
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let table = sample_table();
        let first = table.resolve("tank.png", Some("tank_back.png"));
        let second = table.resolve("tank.png", Some("tank_back.png"));

        assert_eq!(first, second);
    }

    #[test]
    fn test_bson_decoding_skips_malformed_entries() {
        let document = doc! {
            "a": { "Name": "tank.png", "URL": "http://x/1", "Size": 12 },
            "b": { "Name": "no_url.png" },
            "c": "not a document",
            "d": { "Name": "tank_back.png", "URL": "http://x/2" },
        };

        let mut bytes = Vec::new();
        document.to_writer(&mut bytes).unwrap();

        let table = AssociationTable::from_bson_bytes(&bytes).unwrap();
        assert_eq!(table.len(), 2);

        let names: Vec<&str> = table.iter().map(|(_, e)| e.name.as_str()).collect();
        assert_eq!(names, vec!["tank.png", "tank_back.png"]);
    }
}
