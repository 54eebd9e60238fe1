// ✂️ Template Harvesting
// Crop tile symbols and collect unique candidate templates for manual sorting

use crate::config::Region;
use crate::tagging::matcher::{image_files, load_rgb};
use crate::tagging::pipeline::crop;
use crate::tagging::taxonomy::{Taxonomy, UnitFormation, UnitType};
use anyhow::{Context, Result};
use image::RgbImage;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Folder inside each taxonomy directory for not-yet-sorted candidates
pub const UNSORTED_DIR: &str = "unsorted";

/// SHA-256 of the raw RGB pixel bytes, hex encoded
pub fn pixel_digest(image: &RgbImage) -> String {
    let mut hasher = Sha256::new();
    hasher.update(image.as_raw());
    format!("{:x}", hasher.finalize())
}

/// Crop every image in `src` to `region` and write it to `dst` under the same
/// name. Returns how many were written.
///
/// Undecodable files, images that do not overlap `region` (icons, small
/// marker art) and crops that fail to save are skipped.
pub fn crop_tiles(src: &Path, dst: &Path, region: Region) -> Result<usize> {
    fs::create_dir_all(dst).with_context(|| format!("Failed to create {}", dst.display()))?;

    let mut written = 0;
    for path in image_files(src).with_context(|| format!("Failed to list {}", src.display()))? {
        let tile = match load_rgb(&path) {
            Ok(tile) => tile,
            Err(e) => {
                warn!("skipping tile: {}", e);
                continue;
            }
        };

        if region.clamp_to(tile.width(), tile.height()).is_empty() {
            warn!(
                "skipping {}: {}x{} image is outside the crop region",
                path.display(),
                tile.width(),
                tile.height()
            );
            continue;
        }

        let Some(name) = path.file_name() else { continue };
        if let Err(e) = crop(&tile, region).save(dst.join(name)) {
            warn!("Failed to save crop of {}: {}", path.display(), e);
            continue;
        }
        written += 1;
    }

    info!("cropped {} tiles into {}", written, dst.display());
    Ok(written)
}

/// Copy images from `src` to `dst`, keeping only the first of each set of
/// pixel-identical images (in filename order)
pub fn copy_unique_images(src: &Path, dst: &Path) -> Result<usize> {
    fs::create_dir_all(dst).with_context(|| format!("Failed to create {}", dst.display()))?;

    let mut seen = HashSet::new();
    for path in image_files(src).with_context(|| format!("Failed to list {}", src.display()))? {
        let image = match load_rgb(&path) {
            Ok(image) => image,
            Err(e) => {
                warn!("Error processing {}: {}", path.display(), e);
                continue;
            }
        };

        if !seen.insert(pixel_digest(&image)) {
            continue;
        }

        let Some(name) = path.file_name() else { continue };
        image
            .save(dst.join(name))
            .with_context(|| format!("Failed to save {}", path.display()))?;
    }

    info!("{} unique images in {}", seen.len(), dst.display());
    Ok(seen.len())
}

/// `<root>/<taxonomy>/<CATEGORY>/` for every category plus `unsorted/`
pub fn prepare_template_tree(root: &Path) -> Result<()> {
    create_category_dirs::<UnitType>(root)?;
    create_category_dirs::<UnitFormation>(root)?;
    Ok(())
}

fn create_category_dirs<T: Taxonomy>(root: &Path) -> Result<()> {
    let base = root.join(T::TEMPLATE_DIR);
    let names = T::all().iter().map(|c| c.as_str()).chain(std::iter::once(UNSORTED_DIR));

    for name in names {
        let dir = base.join(name);
        fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    Ok(())
}

/// Full harvest: crop both regions from every tile, de-duplicate each into the
/// matching `unsorted/` folder of a fresh template tree
pub fn harvest_templates(
    tiles: &Path,
    out: &Path,
    formation_region: Region,
    type_region: Region,
) -> Result<(usize, usize)> {
    prepare_template_tree(out)?;

    let scratch = scratch_dir(out)?;
    let formation_scratch = scratch.join("formation");
    let type_scratch = scratch.join("type");

    crop_tiles(tiles, &formation_scratch, formation_region)?;
    crop_tiles(tiles, &type_scratch, type_region)?;

    let formations = copy_unique_images(
        &formation_scratch,
        &out.join(UnitFormation::TEMPLATE_DIR).join(UNSORTED_DIR),
    )?;
    let types = copy_unique_images(&type_scratch, &out.join(UnitType::TEMPLATE_DIR).join(UNSORTED_DIR))?;

    fs::remove_dir_all(&scratch).with_context(|| format!("Failed to clean up {}", scratch.display()))?;
    Ok((formations, types))
}

fn scratch_dir(out: &Path) -> Result<std::path::PathBuf> {
    let dir = out.join(".harvest");
    fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    Ok(dir)
}

// ============================================================================
// TESTS
// ============================================================================
