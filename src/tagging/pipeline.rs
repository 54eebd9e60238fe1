// 🧮 Tagging Pipeline
// classify (fan-out per image) → merge overrides → filter → backfill formations
//
// Each image goes Unclassified → Scored → Classified | Rejected, once per
// taxonomy. Images are independent; the template sets are shared read-only.

use crate::config::{Region, TaggingConfig};
use crate::error::ConvertResult;
use crate::tagging::matcher::{image_files, load_rgb, TemplateSet};
use crate::tagging::overrides::{ClassificationRecord, OverrideTable, RecordOrigin};
use crate::tagging::taxonomy::{Taxonomy, UnitFormation, UnitType};
use anyhow::{Context, Result};
use image::imageops;
use image::RgbImage;
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Unclassified tiles with these substrings are kept instead of dropped
pub const RETAIN_UNCLASSIFIED_PATTERNS: [&str; 4] = ["Naval", "Air", "Helo", "Mrk"];

// ============================================================================
// CLASSIFIER
// ============================================================================

pub struct Classifier {
    types: TemplateSet<UnitType>,
    formations: TemplateSet<UnitFormation>,
    config: TaggingConfig,
}

impl Classifier {
    pub fn new(
        types: TemplateSet<UnitType>,
        formations: TemplateSet<UnitFormation>,
        config: TaggingConfig,
    ) -> Self {
        Classifier {
            types,
            formations,
            config,
        }
    }

    /// Templates from `<root>/unit_type_templates` and `<root>/unit_formation_templates`
    pub fn load(template_root: &Path, config: TaggingConfig) -> Self {
        let types = TemplateSet::load(&template_root.join(UnitType::TEMPLATE_DIR));
        let formations = TemplateSet::load(&template_root.join(UnitFormation::TEMPLATE_DIR));
        Classifier::new(types, formations, config)
    }

    /// Classify an already cropped tile symbol
    pub fn classify(&self, filename: &str, symbol: &RgbImage) -> ClassificationRecord {
        let threshold = self.config.threshold;

        let formation_region = crop(symbol, self.config.formation_region);
        let unit_formation = self.formations.best_match(&formation_region, threshold).category();

        let type_region = crop(symbol, self.config.type_region);
        let unit_type = self.types.best_match(&type_region, threshold).category();

        debug!("{}: type={:?} formation={:?}", filename, unit_type, unit_formation);
        ClassificationRecord::computed(filename, unit_type, unit_formation)
    }

    pub fn classify_file(&self, path: &Path) -> ConvertResult<ClassificationRecord> {
        let symbol = load_rgb(path)?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();
        Ok(self.classify(&filename, &symbol))
    }
}

/// Sub-image for `region`, clamped to the image bounds
pub fn crop(image: &RgbImage, region: Region) -> RgbImage {
    let r = region.clamp_to(image.width(), image.height());
    imageops::crop_imm(image, r.x, r.y, r.width, r.height).to_image()
}

/// Classify every image file in `dir` concurrently
///
/// Undecodable files are logged and produce no record. Output is sorted by
/// filename.
pub async fn classify_directory(classifier: Arc<Classifier>, dir: &Path) -> Result<Vec<ClassificationRecord>> {
    let files = image_files(dir).with_context(|| format!("Failed to list images in {}", dir.display()))?;
    info!("classifying {} images from {}", files.len(), dir.display());

    let mut tasks = JoinSet::new();
    for path in files {
        let classifier = Arc::clone(&classifier);
        tasks.spawn_blocking(move || classifier.classify_file(&path));
    }

    let mut records = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(record)) => records.push(record),
            Ok(Err(e)) => warn!("skipping image: {}", e),
            Err(e) => warn!("classification task failed: {}", e),
        }
    }

    records.sort_by(|a, b| a.filename.cmp(&b.filename));
    Ok(records)
}

// ============================================================================
// POST-PASS
// ============================================================================

/// Replace computed records with overrides for the same filename
///
/// Every override is emitted, even for files that were not in the batch.
pub fn apply_overrides(computed: Vec<ClassificationRecord>, overrides: &OverrideTable) -> Vec<ClassificationRecord> {
    let mut merged: Vec<ClassificationRecord> = computed
        .into_iter()
        .filter(|record| {
            let replaced = overrides.contains(&record.filename);
            if replaced {
                debug!("override replaces computed tags for {}", record.filename);
            }
            !replaced
        })
        .collect();

    merged.extend(overrides.rules().iter().map(|rule| rule.to_record()));
    merged.sort_by(|a, b| a.filename.cmp(&b.filename));
    merged
}

#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    pub retained: Vec<ClassificationRecord>,
    pub excluded: Vec<String>,
}

/// Drop records with neither tag, unless the filename marks a tile the
/// templates were never meant to cover
pub fn filter_unclassified(records: Vec<ClassificationRecord>) -> FilterOutcome {
    let mut outcome = FilterOutcome::default();

    for record in records {
        if !record.is_unclassified() || is_retained_unclassified(&record.filename) {
            outcome.retained.push(record);
        } else {
            outcome.excluded.push(record.filename);
        }
    }

    outcome
}

pub fn is_retained_unclassified(filename: &str) -> bool {
    RETAIN_UNCLASSIFIED_PATTERNS.iter().any(|p| filename.contains(p))
}

/// Default missing formations of typed, computed records to the smallest
/// echelon. Returns filenames of records with no type.
pub fn backfill_formations(records: &mut [ClassificationRecord]) -> Vec<String> {
    let mut invalid = Vec::new();

    for record in records.iter_mut() {
        match (record.unit_type, record.unit_formation, record.origin) {
            (None, _, _) => invalid.push(record.filename.clone()),
            (Some(_), None, RecordOrigin::Computed) => {
                record.unit_formation = Some(UnitFormation::SMALLEST);
            }
            _ => {}
        }
    }

    invalid
}

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, Default, Serialize)]
pub struct TaggingReport {
    pub records: Vec<ClassificationRecord>,
    pub excluded: Vec<String>,
    pub invalid: Vec<String>,
}

impl TaggingReport {
    pub fn summary(&self) -> String {
        format!(
            "{} tagged, {} excluded, {} without unit type",
            self.records.len(),
            self.excluded.len(),
            self.invalid.len()
        )
    }
}

/// Overrides, filtering and backfill over computed records
pub fn post_process(computed: Vec<ClassificationRecord>, overrides: &OverrideTable) -> TaggingReport {
    let merged = apply_overrides(computed, overrides);
    let FilterOutcome { mut retained, excluded } = filter_unclassified(merged);
    let invalid = backfill_formations(&mut retained);

    for filename in &invalid {
        warn!("no unit type for {}", filename);
    }

    let unique: HashSet<&str> = retained.iter().map(|r| r.filename.as_str()).collect();
    debug_assert_eq!(unique.len(), retained.len());

    TaggingReport {
        records: retained,
        excluded,
        invalid,
    }
}

/// One filename per row under a `purged filename` header
pub fn write_exclusions_csv(path: &Path, excluded: &[String]) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("Failed to create {}", path.display()))?;

    writer.write_record(["purged filename"])?;
    for filename in excluded {
        writer.write_record([filename])?;
    }
    writer.flush()?;
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tagging::overrides::OverrideRule;
    use image::{ImageBuffer, Rgb};

    fn glyph(width: u32, height: u32, seed: u32) -> RgbImage {
        ImageBuffer::from_fn(width, height, |x, y| {
            let v = ((x * 7 + y * 13 + seed * 29).wrapping_mul(2246822519) >> 25) as u8;
            Rgb([v, 255 - v, v / 2])
        })
    }

    /// 41×33 symbol: formation glyph on top, type glyph below
    fn symbol(formation: &RgbImage, unit_type: &RgbImage) -> RgbImage {
        let mut image = RgbImage::new(41, 33);
        imageops::replace(&mut image, formation, 0, 0);
        imageops::replace(&mut image, unit_type, 0, 12);
        image
    }

    fn classifier() -> (Classifier, RgbImage, RgbImage) {
        let company = glyph(41, 12, 1);
        let armor = glyph(41, 21, 2);
        let classifier = Classifier::new(
            TemplateSet::from_templates(vec![(UnitType::Armor, vec![armor.clone()]), (UnitType::Navy, vec![])]),
            TemplateSet::from_templates(vec![(UnitFormation::Company, vec![company.clone()])]),
            TaggingConfig::default(),
        );
        (classifier, company, armor)
    }

    #[test]
    fn test_classify_reads_both_regions() {
        let (classifier, company, armor) = classifier();
        let record = classifier.classify("x.png", &symbol(&company, &armor));

        assert_eq!(record.unit_type, Some(UnitType::Armor));
        assert_eq!(record.unit_formation, Some(UnitFormation::Company));
    }

    #[test]
    fn test_classify_unknown_glyphs_is_absent() {
        let (classifier, _, _) = classifier();
        let record = classifier.classify("x.png", &symbol(&glyph(41, 12, 50), &glyph(41, 21, 60)));

        assert!(record.is_unclassified());
    }

    #[test]
    fn test_override_wins_over_computed() {
        let computed = vec![ClassificationRecord::computed(
            "7A_US_F_2.png",
            Some(UnitType::Armor),
            Some(UnitFormation::Brigade),
        )];

        let merged = apply_overrides(computed, &OverrideTable::built_in());
        let hits: Vec<_> = merged.iter().filter(|r| r.filename == "7A_US_F_2.png").collect();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].unit_type, Some(UnitType::Missile));
        assert_eq!(hits[0].unit_formation, None);
        assert_eq!(merged.len(), 12);
    }

    #[test]
    fn test_override_survives_backfill() {
        let report = post_process(Vec::new(), &OverrideTable::built_in());
        let missile = report.records.iter().find(|r| r.filename == "7A_US_F_2.png").unwrap();

        assert_eq!(missile.unit_type, Some(UnitType::Missile));
        assert_eq!(missile.unit_formation, None);
    }

    #[test]
    fn test_filter_keeps_naval_and_drops_the_rest() {
        let outcome = filter_unclassified(vec![
            ClassificationRecord::computed("RS_Naval_F_1.png", None, None),
            ClassificationRecord::computed("RS_Ground_Units_F_9.png", None, None),
            ClassificationRecord::computed("Mrk_Spent.png", None, None),
            ClassificationRecord::computed("X_F_1.png", Some(UnitType::Armor), None),
        ]);

        let kept: Vec<&str> = outcome.retained.iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(kept, vec!["RS_Naval_F_1.png", "Mrk_Spent.png", "X_F_1.png"]);
        assert_eq!(outcome.excluded, vec!["RS_Ground_Units_F_9.png"]);
    }

    #[test]
    fn test_backfill_defaults_formation_and_flags_missing_type() {
        let mut records = vec![
            ClassificationRecord::computed("typed.png", Some(UnitType::Infantry), None),
            ClassificationRecord::computed("Helo_F_1.png", None, None),
            ClassificationRecord::computed("formation_only.png", None, Some(UnitFormation::Corps)),
        ];

        let invalid = backfill_formations(&mut records);

        assert_eq!(records[0].unit_formation, Some(UnitFormation::Company));
        assert_eq!(records[1].unit_formation, None);
        assert_eq!(invalid, vec!["Helo_F_1.png", "formation_only.png"]);
    }

    #[test]
    fn test_custom_override_table() {
        let table = OverrideTable::from_rules(vec![OverrideRule {
            filename: "odd.png".to_string(),
            unit_type: UnitType::Navy,
            unit_formation: None,
        }]);

        let report = post_process(vec![ClassificationRecord::computed("odd.png", None, None)], &table);
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].unit_type, Some(UnitType::Navy));
        assert!(report.excluded.is_empty());
    }

    #[tokio::test]
    async fn test_classify_directory_skips_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        let (classifier, company, armor) = classifier();

        symbol(&company, &armor).save(dir.path().join("b_tile.png")).unwrap();
        symbol(&glyph(41, 12, 70), &glyph(41, 21, 80)).save(dir.path().join("a_tile.png")).unwrap();
        std::fs::write(dir.path().join("broken.png"), b"not a png").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let records = classify_directory(Arc::new(classifier), dir.path()).await.unwrap();

        let names: Vec<&str> = records.iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(names, vec!["a_tile.png", "b_tile.png"]);
        assert_eq!(records[1].unit_type, Some(UnitType::Armor));
    }

    #[test]
    fn test_exclusions_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("purged.csv");

        write_exclusions_csv(&path, &["a.png".to_string(), "b.png".to_string()]).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "purged filename\na.png\nb.png\n");
    }
}
