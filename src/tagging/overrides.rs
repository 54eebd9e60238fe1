// ✍️ Manual Overrides
// Tiles the matcher cannot read (army HQs, missile brigades) tagged by hand.
// Rules as data: built-in table, or a JSON file with the same shape.

use crate::tagging::taxonomy::{UnitFormation, UnitType};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

// ============================================================================
// CLASSIFICATION RECORD
// ============================================================================

/// Where a record's tags came from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordOrigin {
    #[default]
    Computed,
    Override,
}

/// Tags for one tile image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRecord {
    pub filename: String,
    pub unit_type: Option<UnitType>,
    pub unit_formation: Option<UnitFormation>,

    #[serde(skip)]
    pub origin: RecordOrigin,
}

impl ClassificationRecord {
    pub fn computed(
        filename: impl Into<String>,
        unit_type: Option<UnitType>,
        unit_formation: Option<UnitFormation>,
    ) -> Self {
        ClassificationRecord {
            filename: filename.into(),
            unit_type,
            unit_formation,
            origin: RecordOrigin::Computed,
        }
    }

    pub fn is_unclassified(&self) -> bool {
        self.unit_type.is_none() && self.unit_formation.is_none()
    }
}

// ============================================================================
// OVERRIDE RULES
// ============================================================================

/// `unit_formation: None` means "this tile has no formation", not "unknown"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideRule {
    pub filename: String,
    pub unit_type: UnitType,
    pub unit_formation: Option<UnitFormation>,
}

impl OverrideRule {
    fn new(filename: &str, unit_type: UnitType, unit_formation: Option<UnitFormation>) -> Self {
        OverrideRule {
            filename: filename.to_string(),
            unit_type,
            unit_formation,
        }
    }

    pub fn to_record(&self) -> ClassificationRecord {
        ClassificationRecord {
            filename: self.filename.clone(),
            unit_type: Some(self.unit_type),
            unit_formation: self.unit_formation,
            origin: RecordOrigin::Override,
        }
    }
}

/// Immutable filename → rule map, keeping the rules' order
#[derive(Debug, Clone, Default)]
pub struct OverrideTable {
    rules: Vec<OverrideRule>,
    index: HashMap<String, usize>,
}

impl OverrideTable {
    /// Later rules for the same filename replace earlier ones
    pub fn from_rules(rules: Vec<OverrideRule>) -> Self {
        let mut table = OverrideTable::default();
        for rule in rules {
            match table.index.get(&rule.filename) {
                Some(&i) => table.rules[i] = rule,
                None => {
                    table.index.insert(rule.filename.clone(), table.rules.len());
                    table.rules.push(rule);
                }
            }
        }
        table
    }

    /// Load rules from a JSON array of `{filename, unit_type, unit_formation}`
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read overrides file: {:?}", path.as_ref()))?;

        let rules: Vec<OverrideRule> = serde_json::from_str(&content).context("Failed to parse overrides JSON")?;

        Ok(OverrideTable::from_rules(rules))
    }

    /// Known Red Strike v1.2 special cases
    pub fn built_in() -> Self {
        use UnitFormation::{Army, Front};
        use UnitType::{Headquarters, Missile};

        OverrideTable::from_rules(vec![
            OverrideRule::new("7A_US_F_1.png", Headquarters, Some(Army)),
            OverrideRule::new("7A_US_F_2.png", Missile, None),
            OverrideRule::new("7A_US_F_3.png", Missile, None),
            OverrideRule::new("7A_US_F_4.png", Missile, None),
            OverrideRule::new("BAOR_F_1.png", Headquarters, Some(Army)),
            OverrideRule::new("NF_SO_F_1.png", Headquarters, Some(Front)),
            OverrideRule::new("RS_Ground_Units_F_286.png", Missile, None),
            OverrideRule::new("RS_Ground_Units_F_287.png", Missile, None),
            OverrideRule::new("SF_SO_F_1.png", Headquarters, Some(Front)),
            OverrideRule::new("SOUTHAG_US_F_2.png", Headquarters, Some(Army)),
            OverrideRule::new("SWF_SO_F_1.png", Headquarters, Some(Front)),
            OverrideRule::new("WF_SO_F_1.png", Headquarters, Some(Front)),
        ])
    }

    pub fn get(&self, filename: &str) -> Option<&OverrideRule> {
        self.index.get(filename).map(|&i| &self.rules[i])
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.index.contains_key(filename)
    }

    pub fn rules(&self) -> &[OverrideRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

// ============================================================================
// TESTS
// ============================================================================
