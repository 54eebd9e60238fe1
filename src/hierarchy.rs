// 🏗️ Hierarchy Parser
// Polymorphic parser over the VASSAL piece-palette tree
//
// Faction → Nation → Command (→ Command ...) → Unit
// Cards    → Deck → Card
// Markers  → MarkerCategory → Marker
//
// The association table is passed down explicitly in a ParseContext, together
// with the lineage of enclosing node kinds. Leaves never look back up the tree.

use crate::association::AssociationTable;
use crate::config::CardBacks;
use crate::error::{ConvertError, ConvertResult};
use crate::markup::{attribute, children, has_container, text};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

// ============================================================================
// VASSAL TAGS
// ============================================================================

pub const GAME_MODULE: &str = "VASSAL.build.GameModule";
pub const PIECE_WINDOW: &str = "VASSAL.build.module.PieceWindow";
pub const TAB_WIDGET: &str = "VASSAL.build.widget.TabWidget";
pub const LIST_WIDGET: &str = "VASSAL.build.widget.ListWidget";
pub const PANEL_WIDGET: &str = "VASSAL.build.widget.PanelWidget";
pub const PIECE_SLOT: &str = "VASSAL.build.widget.PieceSlot";

/// Palette entries with these names are not factions
pub const CARDS_ENTRY: &str = "Cards";
pub const MARKERS_ENTRY: &str = "Markers";

/// The first `;` segment containing this is the image segment
pub const IMAGE_EXTENSION: &str = ".png";

// ============================================================================
// NODE KINDS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Faction,
    Nation,
    Command,
    Unit,
    Deck,
    Card,
    MarkerCategory,
    Marker,
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Faction => "Faction",
            NodeKind::Nation => "Nation",
            NodeKind::Command => "Command",
            NodeKind::Unit => "Unit",
            NodeKind::Deck => "Deck",
            NodeKind::Card => "Card",
            NodeKind::MarkerCategory => "MarkerCategory",
            NodeKind::Marker => "Marker",
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, NodeKind::Unit | NodeKind::Card | NodeKind::Marker)
    }
}

/// Which side of the Cold War a deck belongs to. Decides the card back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeckSide {
    Nato,
    Wp,
}

impl DeckSide {
    /// "NATO" is checked before "WP"
    pub fn from_deck_name(name: &str) -> Option<Self> {
        if name.contains("NATO") {
            Some(DeckSide::Nato)
        } else if name.contains("WP") {
            Some(DeckSide::Wp)
        } else {
            None
        }
    }

    pub fn back_png<'a>(&self, backs: &'a CardBacks) -> &'a str {
        match self {
            DeckSide::Nato => &backs.nato,
            DeckSide::Wp => &backs.wp,
        }
    }
}

// ============================================================================
// PARSED NODES
// ============================================================================

/// One physical tile: unit counter, card, or marker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leaf {
    pub kind: NodeKind,
    pub name: String,
    pub front_png: Option<String>,
    pub front_png_url: Option<String>,
    pub back_png: Option<String>,
    pub back_png_url: Option<String>,
}

impl Leaf {
    fn unresolved(kind: NodeKind, name: String, refs: ImageRefs) -> Self {
        Leaf {
            kind,
            name,
            front_png: refs.front,
            front_png_url: None,
            back_png: refs.back,
            back_png_url: None,
        }
    }

    /// Fill both locators from the table. A missing back ref stays unresolved.
    pub fn resolve(&mut self, table: &AssociationTable) {
        match self.front_png.as_deref() {
            Some(front) => {
                let resolved = table.resolve(front, self.back_png.as_deref());
                self.front_png_url = resolved.primary;
                self.back_png_url = resolved.secondary;
            }
            None => {
                self.front_png_url = None;
                self.back_png_url = self
                    .back_png
                    .as_deref()
                    .and_then(|back| table.resolve(back, None).primary);
            }
        }
    }

    /// Both requested locators were found
    pub fn is_fully_resolved(&self) -> bool {
        let front_ok = self.front_png.is_none() || self.front_png_url.is_some();
        let back_ok = self.back_png.is_none() || self.back_png_url.is_some();
        front_ok && back_ok
    }
}

/// Non-leaf node: faction, nation, command, deck, marker category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub kind: NodeKind,
    pub name: String,
    pub children: Vec<HierarchyNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HierarchyNode {
    Group(Group),
    Leaf(Leaf),
}

impl HierarchyNode {
    pub fn name(&self) -> &str {
        match self {
            HierarchyNode::Group(group) => &group.name,
            HierarchyNode::Leaf(leaf) => &leaf.name,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            HierarchyNode::Group(group) => group.kind,
            HierarchyNode::Leaf(leaf) => leaf.kind,
        }
    }

    pub fn children(&self) -> &[HierarchyNode] {
        match self {
            HierarchyNode::Group(group) => &group.children,
            HierarchyNode::Leaf(_) => &[],
        }
    }

    /// All leaves below (or at) this node, depth-first
    pub fn leaves(&self) -> Vec<&Leaf> {
        let mut out = Vec::new();
        collect_leaves(self, &mut out);
        out
    }

    pub fn leaf_count(&self) -> usize {
        match self {
            HierarchyNode::Group(group) => group.children.iter().map(HierarchyNode::leaf_count).sum(),
            HierarchyNode::Leaf(_) => 1,
        }
    }
}

fn collect_leaves<'a>(node: &'a HierarchyNode, out: &mut Vec<&'a Leaf>) {
    match node {
        HierarchyNode::Group(group) => group.children.iter().for_each(|c| collect_leaves(c, out)),
        HierarchyNode::Leaf(leaf) => out.push(leaf),
    }
}

/// Card deck with its side already decided
#[derive(Debug, Clone, PartialEq)]
pub struct Deck {
    pub name: String,
    pub side: Option<DeckSide>,
    pub cards: Vec<Leaf>,
}

impl Deck {
    pub fn to_node(&self) -> HierarchyNode {
        HierarchyNode::Group(Group {
            kind: NodeKind::Deck,
            name: self.name.clone(),
            children: self.cards.iter().cloned().map(HierarchyNode::Leaf).collect(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkerCategory {
    pub name: String,
    pub markers: Vec<Leaf>,
}

impl MarkerCategory {
    pub fn to_node(&self) -> HierarchyNode {
        HierarchyNode::Group(Group {
            kind: NodeKind::MarkerCategory,
            name: self.name.clone(),
            children: self.markers.iter().cloned().map(HierarchyNode::Leaf).collect(),
        })
    }
}

// ============================================================================
// PARSE CONTEXT
// ============================================================================

/// Everything a node needs from its ancestors, passed down explicitly
#[derive(Debug, Clone)]
pub struct ParseContext<'a> {
    pub table: &'a AssociationTable,
    pub card_backs: &'a CardBacks,
    lineage: Vec<(NodeKind, String)>,
    deck_side: Option<DeckSide>,
}

impl<'a> ParseContext<'a> {
    pub fn new(table: &'a AssociationTable, card_backs: &'a CardBacks) -> Self {
        ParseContext {
            table,
            card_backs,
            lineage: Vec::new(),
            deck_side: None,
        }
    }

    /// Context for the children of a freshly named node
    pub fn enter(&self, kind: NodeKind, name: &str) -> Self {
        let mut child = self.clone();
        child.lineage.push((kind, name.to_string()));
        if kind == NodeKind::Deck {
            child.deck_side = DeckSide::from_deck_name(name);
        }
        child
    }

    /// Kind of the outermost enclosing node
    pub fn root_kind(&self) -> Option<NodeKind> {
        self.lineage.first().map(|(kind, _)| *kind)
    }

    /// "NATO Units/US/V Corps" style path for diagnostics
    pub fn path(&self) -> String {
        self.lineage
            .iter()
            .map(|(_, name)| name.as_str())
            .collect::<Vec<_>>()
            .join("/")
    }

    fn locate(&self, name: &str) -> String {
        if self.lineage.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.path(), name)
        }
    }
}

// ============================================================================
// CORE TRAIT
// ============================================================================

/// One parser per node kind. New kinds add an implementation, nothing else.
pub trait NodeParser {
    fn kind(&self) -> NodeKind;

    fn parse(&self, raw: &Value, ctx: &ParseContext<'_>) -> ConvertResult<HierarchyNode>;
}

/// Factory: the parser for a node kind
pub fn get_parser(kind: NodeKind) -> Box<dyn NodeParser> {
    match kind {
        NodeKind::Faction => Box::new(FactionParser),
        NodeKind::Nation => Box::new(NationParser),
        NodeKind::Command => Box::new(CommandParser),
        NodeKind::Unit => Box::new(UnitParser),
        NodeKind::Deck => Box::new(DeckParser),
        NodeKind::Card => Box::new(CardParser),
        NodeKind::MarkerCategory => Box::new(MarkerCategoryParser),
        NodeKind::Marker => Box::new(MarkerParser),
    }
}

/// Parse a raw node of a known kind
pub fn parse(kind: NodeKind, raw: &Value, ctx: &ParseContext<'_>) -> ConvertResult<HierarchyNode> {
    get_parser(kind).parse(raw, ctx)
}

// ============================================================================
// SHARED HELPERS
// ============================================================================

/// Display name with the source's backslash artifacts cleaned up
///
/// Commands drop backslashes entirely, every other kind turns them into spaces.
/// Only commands tolerate a missing name.
pub fn display_name(kind: NodeKind, raw: &Value, ctx: &ParseContext<'_>) -> ConvertResult<String> {
    match (kind, attribute(raw, "entryName")) {
        (NodeKind::Command, name) => Ok(name.unwrap_or("").replace('\\', "")),
        (_, Some(name)) => Ok(name.replace('\\', " ")),
        (_, None) => Err(ConvertError::structure(
            ctx.locate("<unnamed>"),
            format!("{} has no entryName", kind.name()),
        )),
    }
}

/// Front and optional back image filename of a piece
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageRefs {
    pub front: Option<String>,
    pub back: Option<String>,
}

/// Find the image segment of a PieceSlot's `;`-separated definition
///
/// `front.png` → front only, `front.png,back.png` → both. Any other comma count
/// returns the offending segment as the error.
pub fn extract_image_refs(definition: &str) -> Result<ImageRefs, String> {
    let Some(segment) = definition
        .split(';')
        .find(|segment| segment.contains(IMAGE_EXTENSION))
    else {
        return Ok(ImageRefs::default());
    };

    let parts: Vec<&str> = segment.split(',').collect();
    match parts.as_slice() {
        [front] => Ok(ImageRefs {
            front: Some(front.to_string()),
            back: None,
        }),
        [front, back] => Ok(ImageRefs {
            front: Some(front.to_string()),
            back: Some(back.to_string()),
        }),
        _ => Err(segment.to_string()),
    }
}

fn parse_leaf(kind: NodeKind, raw: &Value, ctx: &ParseContext<'_>) -> ConvertResult<Leaf> {
    let name = display_name(kind, raw, ctx)?;
    let refs = extract_image_refs(text(raw)).map_err(|segment| ConvertError::MalformedImageRef {
        node: ctx.locate(&name),
        segment,
    })?;

    Ok(Leaf::unresolved(kind, name, refs))
}

fn parse_all(
    kind: NodeKind,
    raws: Vec<&Value>,
    ctx: &ParseContext<'_>,
    out: &mut Vec<HierarchyNode>,
) -> ConvertResult<()> {
    let parser = get_parser(kind);
    debug!("{} {} nodes under {}", raws.len(), parser.kind().name(), ctx.path());
    for raw in raws {
        out.push(parser.parse(raw, ctx)?);
    }
    Ok(())
}

fn warn_if_empty(kind: NodeKind, ctx: &ParseContext<'_>, children: &[HierarchyNode], what: &str) {
    if children.is_empty() {
        warn!("{} with no {}: {}", kind.name(), what, ctx.path());
    }
}

// ============================================================================
// GROUP PARSERS
// ============================================================================

/// Faction: nations from TabWidget, then PanelWidget
pub struct FactionParser;

impl NodeParser for FactionParser {
    fn kind(&self) -> NodeKind {
        NodeKind::Faction
    }

    fn parse(&self, raw: &Value, ctx: &ParseContext<'_>) -> ConvertResult<HierarchyNode> {
        let name = display_name(NodeKind::Faction, raw, ctx)?;
        let inner = ctx.enter(NodeKind::Faction, &name);

        let mut nations = Vec::new();
        parse_all(NodeKind::Nation, children(raw, TAB_WIDGET), &inner, &mut nations)?;
        parse_all(NodeKind::Nation, children(raw, PANEL_WIDGET), &inner, &mut nations)?;
        warn_if_empty(NodeKind::Faction, &inner, &nations, "nations");

        Ok(HierarchyNode::Group(Group {
            kind: NodeKind::Faction,
            name,
            children: nations,
        }))
    }
}

/// Nation: commands from ListWidget, then TabWidget
pub struct NationParser;

impl NodeParser for NationParser {
    fn kind(&self) -> NodeKind {
        NodeKind::Nation
    }

    fn parse(&self, raw: &Value, ctx: &ParseContext<'_>) -> ConvertResult<HierarchyNode> {
        let name = display_name(NodeKind::Nation, raw, ctx)?;
        let inner = ctx.enter(NodeKind::Nation, &name);

        let mut commands = Vec::new();
        parse_all(NodeKind::Command, children(raw, LIST_WIDGET), &inner, &mut commands)?;
        parse_all(NodeKind::Command, children(raw, TAB_WIDGET), &inner, &mut commands)?;
        warn_if_empty(NodeKind::Nation, &inner, &commands, "commands");

        Ok(HierarchyNode::Group(Group {
            kind: NodeKind::Nation,
            name,
            children: commands,
        }))
    }
}

/// Command: sub-commands (any depth) first, then its own units
pub struct CommandParser;

impl NodeParser for CommandParser {
    fn kind(&self) -> NodeKind {
        NodeKind::Command
    }

    fn parse(&self, raw: &Value, ctx: &ParseContext<'_>) -> ConvertResult<HierarchyNode> {
        let name = display_name(NodeKind::Command, raw, ctx)?;
        let inner = ctx.enter(NodeKind::Command, &name);

        let mut members = Vec::new();
        parse_all(NodeKind::Command, children(raw, LIST_WIDGET), &inner, &mut members)?;
        parse_all(NodeKind::Command, children(raw, TAB_WIDGET), &inner, &mut members)?;
        parse_all(NodeKind::Unit, children(raw, PIECE_SLOT), &inner, &mut members)?;
        warn_if_empty(NodeKind::Command, &inner, &members, "units or sub-commands");

        Ok(HierarchyNode::Group(Group {
            kind: NodeKind::Command,
            name,
            children: members,
        }))
    }
}

/// Deck: cards under ListWidget → PieceSlot
pub struct DeckParser;

impl DeckParser {
    pub fn parse_deck(&self, raw: &Value, ctx: &ParseContext<'_>) -> ConvertResult<Deck> {
        let name = display_name(NodeKind::Deck, raw, ctx)?;
        let inner = ctx.enter(NodeKind::Deck, &name);
        let side = DeckSide::from_deck_name(&name);

        let mut cards = Vec::new();
        if side.is_none() {
            warn!("bad deck, neither NATO nor WP: {}", inner.path());
        } else {
            if !has_container(raw, LIST_WIDGET) {
                warn!("Deck with no card list: {}", inner.path());
            }
            for list in children(raw, LIST_WIDGET) {
                for slot in children(list, PIECE_SLOT) {
                    cards.push(CardParser.parse_card(slot, &inner)?);
                }
            }
        }

        Ok(Deck { name, side, cards })
    }
}

impl NodeParser for DeckParser {
    fn kind(&self) -> NodeKind {
        NodeKind::Deck
    }

    fn parse(&self, raw: &Value, ctx: &ParseContext<'_>) -> ConvertResult<HierarchyNode> {
        Ok(self.parse_deck(raw, ctx)?.to_node())
    }
}

/// Marker category: markers directly under PieceSlot
pub struct MarkerCategoryParser;

impl MarkerCategoryParser {
    pub fn parse_category(&self, raw: &Value, ctx: &ParseContext<'_>) -> ConvertResult<MarkerCategory> {
        let name = display_name(NodeKind::MarkerCategory, raw, ctx)?;
        let inner = ctx.enter(NodeKind::MarkerCategory, &name);

        let mut markers = Vec::new();
        for slot in children(raw, PIECE_SLOT) {
            match MarkerParser.parse_marker(slot, &inner) {
                Ok(marker) => markers.push(marker),
                Err(ConvertError::MalformedImageRef { node, segment }) => {
                    warn!("weird marker {}: '{}'", node, segment);
                }
                Err(e) => return Err(e),
            }
        }

        if markers.is_empty() {
            warn!("MarkerCategory with no markers: {}", inner.path());
        }

        Ok(MarkerCategory { name, markers })
    }
}

impl NodeParser for MarkerCategoryParser {
    fn kind(&self) -> NodeKind {
        NodeKind::MarkerCategory
    }

    fn parse(&self, raw: &Value, ctx: &ParseContext<'_>) -> ConvertResult<HierarchyNode> {
        Ok(self.parse_category(raw, ctx)?.to_node())
    }
}

// ============================================================================
// LEAF PARSERS
// ============================================================================

/// Unit counter. Must sit somewhere below a Faction.
pub struct UnitParser;

impl NodeParser for UnitParser {
    fn kind(&self) -> NodeKind {
        NodeKind::Unit
    }

    fn parse(&self, raw: &Value, ctx: &ParseContext<'_>) -> ConvertResult<HierarchyNode> {
        let mut unit = parse_leaf(NodeKind::Unit, raw, ctx)?;

        if ctx.root_kind() != Some(NodeKind::Faction) {
            return Err(ConvertError::structure(
                ctx.locate(&unit.name),
                "unit is not nested under a faction",
            ));
        }

        unit.resolve(ctx.table);
        if !unit.is_fully_resolved() {
            debug!("unresolved image reference in {}", ctx.locate(&unit.name));
        }

        Ok(HierarchyNode::Leaf(unit))
    }
}

/// Card. The back image comes from the deck side, not from the piece.
pub struct CardParser;

impl CardParser {
    pub fn parse_card(&self, raw: &Value, ctx: &ParseContext<'_>) -> ConvertResult<Leaf> {
        let mut card = parse_leaf(NodeKind::Card, raw, ctx)?;

        let side = ctx.deck_side.ok_or_else(|| {
            ConvertError::structure(ctx.locate(&card.name), "card is not inside a NATO or WP deck")
        })?;

        card.back_png = Some(side.back_png(ctx.card_backs).to_string());
        card.resolve(ctx.table);
        Ok(card)
    }
}

impl NodeParser for CardParser {
    fn kind(&self) -> NodeKind {
        NodeKind::Card
    }

    fn parse(&self, raw: &Value, ctx: &ParseContext<'_>) -> ConvertResult<HierarchyNode> {
        Ok(HierarchyNode::Leaf(self.parse_card(raw, ctx)?))
    }
}

/// Marker. Single-sided markers reuse the front as the back.
pub struct MarkerParser;

impl MarkerParser {
    pub fn parse_marker(&self, raw: &Value, ctx: &ParseContext<'_>) -> ConvertResult<Leaf> {
        let mut marker = parse_leaf(NodeKind::Marker, raw, ctx)?;
        marker.resolve(ctx.table);

        if marker.back_png.is_none() {
            marker.back_png = marker.front_png.clone();
            marker.back_png_url = marker.front_png_url.clone();
        }

        Ok(marker)
    }
}

impl NodeParser for MarkerParser {
    fn kind(&self) -> NodeKind {
        NodeKind::Marker
    }

    fn parse(&self, raw: &Value, ctx: &ParseContext<'_>) -> ConvertResult<HierarchyNode> {
        Ok(HierarchyNode::Leaf(self.parse_marker(raw, ctx)?))
    }
}

// ============================================================================
// MODULE ENTRY POINT
// ============================================================================

/// Everything pulled out of one buildFile
#[derive(Debug, Clone, Default)]
pub struct ParsedModule {
    pub factions: Vec<HierarchyNode>,
    pub decks: Vec<Deck>,
    pub marker_categories: Vec<MarkerCategory>,
}

impl ParsedModule {
    pub fn deck_nodes(&self) -> Vec<HierarchyNode> {
        self.decks.iter().map(Deck::to_node).collect()
    }

    pub fn marker_nodes(&self) -> Vec<HierarchyNode> {
        self.marker_categories.iter().map(MarkerCategory::to_node).collect()
    }
}

/// Walk GameModule → first PieceWindow → TabWidget → TabWidget entries
///
/// "Cards" holds decks, "Markers" holds marker categories, everything else is
/// a faction.
pub fn parse_module(
    document: &Value,
    table: &AssociationTable,
    card_backs: &CardBacks,
) -> ConvertResult<ParsedModule> {
    let module = document
        .get(GAME_MODULE)
        .ok_or_else(|| ConvertError::structure(GAME_MODULE, "document has no game module root"))?;

    let window = children(module, PIECE_WINDOW)
        .into_iter()
        .next()
        .ok_or_else(|| ConvertError::structure(GAME_MODULE, "module has no piece window"))?;

    let palette = children(window, TAB_WIDGET)
        .into_iter()
        .next()
        .ok_or_else(|| ConvertError::structure(PIECE_WINDOW, "piece window has no tab widget"))?;

    let ctx = ParseContext::new(table, card_backs);
    let mut parsed = ParsedModule::default();

    for entry in children(palette, TAB_WIDGET) {
        match attribute(entry, "entryName") {
            Some(CARDS_ENTRY) => {
                for raw_deck in children(entry, TAB_WIDGET) {
                    parsed.decks.push(DeckParser.parse_deck(raw_deck, &ctx)?);
                }
                debug!("parsed {} decks", parsed.decks.len());
            }
            Some(MARKERS_ENTRY) => {
                for raw_category in children(entry, LIST_WIDGET) {
                    parsed
                        .marker_categories
                        .push(MarkerCategoryParser.parse_category(raw_category, &ctx)?);
                }
            }
            _ => parsed.factions.push(FactionParser.parse(entry, &ctx)?),
        }
    }

    Ok(parsed)
}

// ============================================================================
// TESTS
// ============================================================================
