// Unit Tile Tagging
// Template-matching classifier for the NATO symbol on each unit tile

pub mod extract;
pub mod matcher;
pub mod overrides;
pub mod pipeline;
pub mod taxonomy;

pub use extract::{copy_unique_images, crop_tiles, harvest_templates, prepare_template_tree};
pub use matcher::{correlation_score, TemplateSet, Verdict};
pub use overrides::{ClassificationRecord, OverrideRule, OverrideTable, RecordOrigin};
pub use pipeline::{
    apply_overrides, backfill_formations, classify_directory, filter_unclassified, post_process,
    write_exclusions_csv, Classifier, TaggingReport,
};
pub use taxonomy::{Taxonomy, UnitFormation, UnitType};
