// 🎲 Tabletop Packaging
// Turns the flattened faction and card exports into a Tabletop Simulator save:
// one root bag holding a tagged counter box per faction and a deck per card set

use crate::config::PackagingLayout;
use crate::error::{ConvertError, ConvertResult};
use crate::tree_walker::{is_leaf_record, LeafRecord};
use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::{json, Map, Value};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default object templates shipped with the crate
pub const EMBEDDED_TEMPLATES: &str = include_str!("../assets/tts_templates.json");

pub const CARD_ENTRY: &str = "cardEntry";
pub const CARD: &str = "card";
pub const DECK: &str = "deck";
pub const TILE: &str = "tile";
pub const BAG: &str = "bag";
pub const SAVE: &str = "ttsSave";

/// Card ids inside a deck are the one-based entry index times this
pub const CARD_ID_STRIDE: u64 = 101;

/// First six characters of a random UUID
pub fn new_guid() -> String {
    Uuid::new_v4().simple().to_string()[..6].to_string()
}

// ============================================================================
// OBJECT TEMPLATES
// ============================================================================

/// Named JSON object skeletons. Every instance is a deep copy with a new GUID.
#[derive(Debug, Clone)]
pub struct ObjectTemplates {
    objects: Map<String, Value>,
}

impl ObjectTemplates {
    pub fn from_json(content: &str) -> ConvertResult<Self> {
        let objects: Map<String, Value> = serde_json::from_str(content)?;
        Ok(ObjectTemplates { objects })
    }

    pub fn embedded() -> ConvertResult<Self> {
        Self::from_json(EMBEDDED_TEMPLATES)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read templates file: {:?}", path.as_ref()))?;

        Self::from_json(&content).context("Failed to parse templates JSON")
    }

    /// File templates when a path is given, embedded ones otherwise
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::embedded()?),
        }
    }

    pub fn instantiate(&self, name: &str) -> ConvertResult<Map<String, Value>> {
        let mut object = self
            .objects
            .get(name)
            .and_then(Value::as_object)
            .cloned()
            .ok_or_else(|| ConvertError::MissingTemplate(name.to_string()))?;

        object.insert("GUID".to_string(), json!(new_guid()));
        Ok(object)
    }
}

// ============================================================================
// PACKAGER
// ============================================================================

pub struct Packager<'a> {
    templates: &'a ObjectTemplates,
}

impl<'a> Packager<'a> {
    pub fn new(templates: &'a ObjectTemplates) -> Self {
        Packager { templates }
    }

    fn card_entry(&self, record: &LeafRecord) -> ConvertResult<Value> {
        let mut entry = self.templates.instantiate(CARD_ENTRY)?;
        entry.insert("FaceURL".to_string(), json!(record.front_png_url));
        entry.insert("BackURL".to_string(), json!(record.back_png_url));
        Ok(Value::Object(entry))
    }

    fn card(&self, card_id: u64, entry: Value) -> ConvertResult<Value> {
        let mut card = self.templates.instantiate(CARD)?;
        card.insert("CardID".to_string(), json!(card_id * CARD_ID_STRIDE));

        let mut custom = Map::new();
        custom.insert(card_id.to_string(), entry);
        card.insert("CustomDeck".to_string(), Value::Object(custom));
        Ok(Value::Object(card))
    }

    /// One deck from a card set: entries numbered from 1 in document order
    pub fn deck(&self, cards: &Map<String, Value>, nickname: &str) -> ConvertResult<Value> {
        let mut deck = self.templates.instantiate(DECK)?;

        let mut custom = Map::new();
        let mut deck_ids = Vec::new();
        let mut contained = Vec::new();

        for (index, record) in deck_records(cards).into_iter().enumerate() {
            let card_id = index as u64 + 1;
            let entry = self.card_entry(&record)?;

            custom.insert(card_id.to_string(), entry.clone());
            deck_ids.push(json!(card_id * CARD_ID_STRIDE));
            contained.push(self.card(card_id, entry)?);
        }

        debug!("deck '{}' holds {} cards", nickname, contained.len());
        deck.insert("CustomDeck".to_string(), Value::Object(custom));
        deck.insert("DeckIDs".to_string(), Value::Array(deck_ids));
        deck.insert("Nickname".to_string(), json!(nickname));
        deck.insert("ContainedObjects".to_string(), Value::Array(contained));
        Ok(Value::Object(deck))
    }

    /// Two-sided tile; the back shows the front when no back locator exists
    pub fn tile(&self, name: &str, record: &LeafRecord, tags: &[String]) -> ConvertResult<Value> {
        let mut tile = self.templates.instantiate(TILE)?;
        let front = record.front_png_url.clone();
        let back = match record.back_png_url.as_deref() {
            Some(url) if !url.is_empty() => Some(url.to_string()),
            _ => front.clone(),
        };

        let image = tile
            .entry("CustomImage".to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Some(image) = image.as_object_mut() {
            image.insert("ImageURL".to_string(), json!(front));
            image.insert("ImageSecondaryURL".to_string(), json!(back));
        }

        tile.insert("Tags".to_string(), json!(tags));
        tile.insert("Nickname".to_string(), json!(name));
        Ok(Value::Object(tile))
    }

    fn bag(&self, nickname: &str, tags: &[String], contained: Vec<Value>) -> ConvertResult<Value> {
        let mut bag = self.templates.instantiate(BAG)?;
        bag.insert("Nickname".to_string(), json!(nickname));
        bag.insert("Tags".to_string(), json!(tags));
        bag.insert("ContainedObjects".to_string(), Value::Array(contained));
        Ok(Value::Object(bag))
    }

    /// Faction bag tagged with `tag`, one nested bag per group below it.
    /// Each bag and tile carries the tags of every bag above it plus its own
    /// group name.
    pub fn counter_box(&self, faction: &Map<String, Value>, tag: &str, nickname: &str) -> ConvertResult<Value> {
        let tags = vec![tag.to_string()];
        let contained = self.bag_contents(faction, &tags)?;
        self.bag(nickname, &tags, contained)
    }

    fn bag_contents(&self, group: &Map<String, Value>, tags: &[String]) -> ConvertResult<Vec<Value>> {
        let mut contained = Vec::new();

        for (name, value) in group {
            if is_leaf_record(value) {
                match serde_json::from_value::<LeafRecord>(value.clone()) {
                    Ok(record) => contained.push(self.tile(name, &record, tags)?),
                    Err(e) => warn!("skipping tile '{}': {}", name, e),
                }
            } else if let Some(children) = value.as_object() {
                let mut child_tags = tags.to_vec();
                child_tags.push(name.clone());
                let child_contents = self.bag_contents(children, &child_tags)?;
                contained.push(self.bag(name, &child_tags, child_contents)?);
            } else {
                warn!("skipping '{}': neither a group nor a leaf record", name);
            }
        }

        Ok(contained)
    }

    /// Full save: root bag with the configured counter boxes then decks.
    /// Sources missing from the exports are logged and left out.
    pub fn build_save(
        &self,
        factions: &Map<String, Value>,
        cards: &Map<String, Value>,
        layout: &PackagingLayout,
    ) -> ConvertResult<Value> {
        let mut contained = Vec::new();

        for spec in &layout.counter_boxes {
            match factions.get(&spec.source).and_then(Value::as_object) {
                Some(faction) => contained.push(self.counter_box(faction, &spec.tag, &spec.nickname)?),
                None => warn!("no faction '{}' in export, skipping counter box", spec.source),
            }
        }

        for spec in &layout.decks {
            match cards.get(&spec.source).and_then(Value::as_object) {
                Some(deck) => contained.push(self.deck(deck, &spec.nickname)?),
                None => warn!("no deck '{}' in export, skipping", spec.source),
            }
        }

        info!("packaged {} top-level objects", contained.len());
        let root = self.bag(&layout.root_nickname, &[], contained)?;

        let mut save = self.templates.instantiate(SAVE)?;
        save.insert("Date".to_string(), json!(Utc::now().format("%m/%d/%Y %I:%M:%S %p").to_string()));
        save.insert("ObjectStates".to_string(), Value::Array(vec![root]));
        Ok(Value::Object(save))
    }
}

/// Leaf records of one deck in document order
fn deck_records(cards: &Map<String, Value>) -> Vec<LeafRecord> {
    cards
        .iter()
        .filter(|(_, value)| is_leaf_record(value))
        .filter_map(|(name, value)| match serde_json::from_value(value.clone()) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("skipping card '{}': {}", name, e);
                None
            }
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
