// ⚙️ Tool Configuration
// Every knob has a default matching the Red Strike v1.2 module.
// A JSON file may override any subset of them.

use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

// ============================================================================
// CARD BACKS
// ============================================================================

/// Fixed back images for the two card decks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CardBacks {
    pub nato: String,
    pub wp: String,
}

impl Default for CardBacks {
    fn default() -> Self {
        CardBacks {
            nato: "NATO_Card_Back.png".to_string(),
            wp: "WP_Card_Back.png".to_string(),
        }
    }
}

// ============================================================================
// IMAGE REGIONS
// ============================================================================

/// Pixel rectangle, top-left corner plus size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Region { x, y, width, height }
    }

    /// PIL-style box: (left, upper, right, lower), right/lower exclusive
    pub const fn from_corners(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Region::new(x1, y1, x2.saturating_sub(x1), y2.saturating_sub(y1))
    }

    /// Part of this region that lies inside a `width` × `height` image
    pub fn clamp_to(&self, width: u32, height: u32) -> Region {
        let x = self.x.min(width);
        let y = self.y.min(height);
        Region {
            x,
            y,
            width: self.width.min(width - x),
            height: self.height.min(height - y),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// NATO symbol box on a full unit tile
pub const TILE_SYMBOL_REGION: Region = Region::from_corners(90, 39, 131, 72);

/// Formation pips, relative to the cropped symbol
pub const FORMATION_REGION: Region = Region::from_corners(0, 0, 41, 12);

/// Unit type glyph, relative to the cropped symbol
pub const TYPE_REGION: Region = Region::from_corners(0, 12, 41, 33);

// ============================================================================
// TAGGING
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaggingConfig {
    /// Minimum correlation score, applied to both taxonomies
    pub threshold: f32,
    pub formation_region: Region,
    pub type_region: Region,
    /// Crop applied to full tiles before classification
    pub tile_region: Region,
    /// JSON list of manual overrides replacing the built-in table
    pub overrides_path: Option<PathBuf>,
}

impl Default for TaggingConfig {
    fn default() -> Self {
        TaggingConfig {
            threshold: 0.7,
            formation_region: FORMATION_REGION,
            type_region: TYPE_REGION,
            tile_region: TILE_SYMBOL_REGION,
            overrides_path: None,
        }
    }
}

impl TaggingConfig {
    /// Formation region on a full tile, used when harvesting templates
    pub fn formation_template_region(&self) -> Region {
        offset(self.tile_region, self.formation_region)
    }

    /// Type region on a full tile, used when harvesting templates
    pub fn type_template_region(&self) -> Region {
        offset(self.tile_region, self.type_region)
    }
}

fn offset(outer: Region, inner: Region) -> Region {
    Region::new(
        outer.x.saturating_add(inner.x),
        outer.y.saturating_add(inner.y),
        inner.width,
        inner.height,
    )
}

// ============================================================================
// PACKAGING
// ============================================================================

/// Faction export that becomes one tagged counter bag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterBoxSpec {
    /// Top-level key in the factions document
    pub source: String,
    pub tag: String,
    pub nickname: String,
}

/// Deck export that becomes one card deck
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckSpec {
    /// Top-level key in the cards document
    pub source: String,
    pub nickname: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackagingLayout {
    pub root_nickname: String,
    pub counter_boxes: Vec<CounterBoxSpec>,
    pub decks: Vec<DeckSpec>,
    /// Object templates replacing the embedded ones
    pub templates_path: Option<PathBuf>,
}

impl Default for PackagingLayout {
    fn default() -> Self {
        PackagingLayout {
            root_nickname: "Generated Counters".to_string(),
            counter_boxes: vec![
                CounterBoxSpec {
                    source: "NATO Units".to_string(),
                    tag: "NATO".to_string(),
                    nickname: "NATO".to_string(),
                },
                CounterBoxSpec {
                    source: "WP Units".to_string(),
                    tag: "Pact".to_string(),
                    nickname: "WP".to_string(),
                },
            ],
            decks: vec![
                DeckSpec {
                    source: "NATO Cards".to_string(),
                    nickname: "NATO Cards".to_string(),
                },
                DeckSpec {
                    source: "WP Cards".to_string(),
                    nickname: "Pact Cards".to_string(),
                },
            ],
            templates_path: None,
        }
    }
}

// ============================================================================
// TOOL CONFIG
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub card_backs: CardBacks,
    pub tagging: TaggingConfig,
    pub packaging: PackagingLayout,
}

impl ToolConfig {
    /// Load config from JSON file; missing fields keep their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        serde_json::from_str(&content).context("Failed to parse config JSON")
    }

    /// Defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::default()),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
