// 🎯 Template Matcher
// Normalized cross-correlation of a tile region against per-category templates

use crate::error::{ConvertError, ConvertResult};
use crate::tagging::taxonomy::Taxonomy;
use image::imageops::{self, FilterType};
use image::RgbImage;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Extensions accepted for tiles and templates (lowercase)
pub const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

const EPSILON: f64 = 1e-12;

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Decode any supported image as 8-bit RGB
pub fn load_rgb(path: &Path) -> ConvertResult<RgbImage> {
    let image = image::open(path).map_err(|e| ConvertError::Decode {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(image.to_rgb8())
}

/// Image files directly inside `dir`, sorted by name
pub fn image_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && is_image_file(path))
        .collect();
    files.sort();
    Ok(files)
}

// ============================================================================
// CORRELATION
// ============================================================================

/// Best zero-mean normalized cross-correlation over all placements
///
/// Channels are pooled: means are per channel, sums run over all three.
/// Flat (zero-variance) windows score 0. A template larger than the image
/// scores 0.
pub fn correlation_score(image: &RgbImage, template: &RgbImage) -> f32 {
    let (iw, ih) = image.dimensions();
    let (tw, th) = template.dimensions();
    if tw == 0 || th == 0 || tw > iw || th > ih {
        return 0.0;
    }

    let n = f64::from(tw * th);
    let mut t_mean = [0.0f64; 3];
    for pixel in template.pixels() {
        for c in 0..3 {
            t_mean[c] += f64::from(pixel[c]);
        }
    }
    t_mean.iter_mut().for_each(|m| *m /= n);

    let centered: Vec<[f64; 3]> = template
        .pixels()
        .map(|p| {
            [
                f64::from(p[0]) - t_mean[0],
                f64::from(p[1]) - t_mean[1],
                f64::from(p[2]) - t_mean[2],
            ]
        })
        .collect();
    let t_norm: f64 = centered.iter().flat_map(|v| v.iter()).map(|v| v * v).sum();

    let mut best = f64::NEG_INFINITY;
    for y in 0..=(ih - th) {
        for x in 0..=(iw - tw) {
            let mut w_mean = [0.0f64; 3];
            for ty in 0..th {
                for tx in 0..tw {
                    let p = image.get_pixel(x + tx, y + ty);
                    for c in 0..3 {
                        w_mean[c] += f64::from(p[c]);
                    }
                }
            }
            w_mean.iter_mut().for_each(|m| *m /= n);

            let mut numerator = 0.0;
            let mut w_norm = 0.0;
            for ty in 0..th {
                for tx in 0..tw {
                    let p = image.get_pixel(x + tx, y + ty);
                    let t = &centered[(ty * tw + tx) as usize];
                    for c in 0..3 {
                        let w = f64::from(p[c]) - w_mean[c];
                        numerator += t[c] * w;
                        w_norm += w * w;
                    }
                }
            }

            let denominator = (t_norm * w_norm).sqrt();
            let score = if denominator > EPSILON {
                numerator / denominator
            } else {
                0.0
            };
            best = best.max(score);
        }
    }

    best as f32
}

/// Score a query region against one template, resizing the template first
/// when the shapes differ
pub fn score_template(query: &RgbImage, template: &RgbImage) -> f32 {
    if query.dimensions() == template.dimensions() {
        correlation_score(query, template)
    } else {
        let (w, h) = query.dimensions();
        let resized = imageops::resize(template, w, h, FilterType::Triangle);
        correlation_score(query, &resized)
    }
}

// ============================================================================
// VERDICT
// ============================================================================

/// Outcome of matching one region against one taxonomy
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict<T> {
    Classified { category: T, score: f32 },
    Rejected,
}

impl<T: Copy> Verdict<T> {
    pub fn category(&self) -> Option<T> {
        match self {
            Verdict::Classified { category, .. } => Some(*category),
            Verdict::Rejected => None,
        }
    }
}

// ============================================================================
// TEMPLATE SET
// ============================================================================

/// All templates for one taxonomy. Read-only once loaded.
#[derive(Debug, Clone)]
pub struct TemplateSet<T: Taxonomy> {
    categories: Vec<(T, Vec<RgbImage>)>,
}

impl<T: Taxonomy> TemplateSet<T> {
    pub fn from_templates(categories: Vec<(T, Vec<RgbImage>)>) -> Self {
        TemplateSet { categories }
    }

    /// Load `<dir>/<CATEGORY>/*` for every category, falling back to
    /// `<dir>/<CATEGORY>.png`. Undecodable templates are skipped.
    pub fn load(dir: &Path) -> Self {
        let mut categories = Vec::with_capacity(T::all().len());

        for category in T::all() {
            let category_dir = dir.join(category.as_str());
            let paths = if category_dir.is_dir() {
                image_files(&category_dir).unwrap_or_else(|e| {
                    warn!("cannot list {}: {}", category_dir.display(), e);
                    Vec::new()
                })
            } else {
                let single = dir.join(format!("{}.png", category.as_str()));
                if single.exists() {
                    vec![single]
                } else {
                    Vec::new()
                }
            };

            let mut templates = Vec::with_capacity(paths.len());
            for path in paths {
                match load_rgb(&path) {
                    Ok(template) => templates.push(template),
                    Err(e) => warn!("skipping template: {}", e),
                }
            }

            debug!("{}: {} templates", category.as_str(), templates.len());
            categories.push((*category, templates));
        }

        let set = TemplateSet { categories };
        info!("loaded {} templates from {}", set.template_count(), dir.display());
        set
    }

    pub fn template_count(&self) -> usize {
        self.categories.iter().map(|(_, templates)| templates.len()).sum()
    }

    /// Best-scoring category whose score beats both the running best and
    /// `threshold`
    pub fn best_match(&self, query: &RgbImage, threshold: f32) -> Verdict<T> {
        if query.width() == 0 || query.height() == 0 {
            return Verdict::Rejected;
        }

        let mut verdict = Verdict::Rejected;
        let mut best_score = 0.0f32;

        for (category, templates) in &self.categories {
            for template in templates {
                let score = score_template(query, template);
                if score > best_score && score > threshold {
                    best_score = score;
                    verdict = Verdict::Classified {
                        category: *category,
                        score,
                    };
                }
            }
        }

        verdict
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tagging::taxonomy::UnitType;
    use image::{ImageBuffer, Rgb};

    fn pattern(width: u32, height: u32, seed: u32) -> RgbImage {
        ImageBuffer::from_fn(width, height, |x, y| {
            let v = ((x * 31 + y * 17 + seed * 101).wrapping_mul(2654435761) >> 24) as u8;
            Rgb([v, v.wrapping_add(40), 255 - v])
        })
    }

    fn stripes(width: u32, height: u32, vertical: bool) -> RgbImage {
        scaled_stripes(width, height, vertical, 1)
    }

    fn scaled_stripes(width: u32, height: u32, vertical: bool, scale: u32) -> RgbImage {
        ImageBuffer::from_fn(width, height, |x, y| {
            let on = if vertical { (x / scale) % 4 < 2 } else { (y / scale) % 4 < 2 };
            if on {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        })
    }

    #[test]
    fn test_identical_images_score_one() {
        let img = pattern(41, 21, 3);
        let score = correlation_score(&img, &img);

        assert!((score - 1.0).abs() < 1e-4, "score was {}", score);
    }

    #[test]
    fn test_inverted_image_scores_minus_one() {
        let img = stripes(12, 12, true);
        let inverted = ImageBuffer::from_fn(12, 12, |x, y| {
            let p = img.get_pixel(x, y);
            Rgb([255 - p[0], 255 - p[1], 255 - p[2]])
        });

        assert!((correlation_score(&img, &inverted) + 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_flat_template_scores_zero() {
        let flat: RgbImage = ImageBuffer::from_pixel(8, 8, Rgb([120, 120, 120]));
        assert_eq!(correlation_score(&pattern(8, 8, 1), &flat), 0.0);
    }

    #[test]
    fn test_smaller_template_finds_its_location() {
        let img = pattern(20, 20, 9);
        let patch = imageops::crop_imm(&img, 5, 7, 6, 6).to_image();

        assert!((correlation_score(&img, &patch) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_best_match_picks_identical_template() {
        let query = stripes(41, 21, true);
        let set = TemplateSet::from_templates(vec![
            (UnitType::Armor, vec![stripes(41, 21, false)]),
            (UnitType::Infantry, vec![pattern(41, 21, 5), stripes(41, 21, true)]),
            (UnitType::Navy, vec![]),
        ]);

        match set.best_match(&query, 0.7) {
            Verdict::Classified { category, score } => {
                assert_eq!(category, UnitType::Infantry);
                assert!((score - 1.0).abs() < 1e-4);
            }
            Verdict::Rejected => panic!("expected a match"),
        }
    }

    #[test]
    fn test_below_threshold_is_rejected() {
        let query = stripes(41, 21, true);
        let set = TemplateSet::from_templates(vec![(UnitType::Armor, vec![stripes(41, 21, false)])]);

        assert_eq!(set.best_match(&query, 0.7), Verdict::Rejected);
    }

    #[test]
    fn test_template_is_resized_to_query() {
        let query = stripes(40, 20, true);
        let template = scaled_stripes(80, 40, true, 2);
        let score = score_template(&query, &template);

        assert!(score > 0.7, "score was {}", score);
    }

    #[test]
    fn test_empty_set_rejects() {
        let set: TemplateSet<UnitType> = TemplateSet::from_templates(vec![]);
        assert_eq!(set.best_match(&pattern(4, 4, 0), 0.7), Verdict::Rejected);
    }
}
