// Red Strike Converter - Core Library
// VASSAL module → JSON hierarchy export, unit tile tagging, Tabletop Simulator packaging

pub mod error;
pub mod config;
pub mod markup;         // XML → attribute/text tree
pub mod association;    // Image name → hosted URL table
pub mod hierarchy;      // Faction / deck / marker parsers
pub mod tree_walker;    // Nested JSON export
pub mod report;
pub mod packaging;      // Tabletop Simulator save builder

#[cfg(feature = "tagging")]
pub mod tagging;        // Template-matching tile classifier

// Re-export commonly used types
pub use error::{ConvertError, ConvertResult};
pub use config::{CardBacks, PackagingLayout, Region, TaggingConfig, ToolConfig};
pub use markup::{as_sequence, parse_document};
pub use association::{AssociationEntry, AssociationTable, ResolvedLocators};
pub use hierarchy::{
    get_parser, parse_module, DeckSide, Group, HierarchyNode, Leaf, NodeKind, NodeParser,
    ParseContext, ParsedModule,
};
pub use tree_walker::{flat_leaves, flatten, read_flattened, write_json, LeafRecord};
pub use report::ConversionReport;
pub use packaging::{ObjectTemplates, Packager};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
