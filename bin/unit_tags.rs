// Red Strike Converter - Unit Tile Tagger
// crop: tiles → NATO symbol crops
// prepare: tiles → template tree with de-duplicated unsorted candidates
// classify: symbol crops + sorted templates → unit_tags.json + purged.csv

use anyhow::Result;
use clap::{Parser, Subcommand};
use redstrike_tts::tagging::{classify_directory, crop_tiles, harvest_templates, post_process, write_exclusions_csv};
use redstrike_tts::tagging::{Classifier, OverrideTable};
use redstrike_tts::{write_json, TaggingConfig, ToolConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "unit-tags")]
#[command(about = "Tag Red Strike unit tiles by type and formation", version, long_about = None)]
struct Cli {
    /// JSON config file; defaults apply when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crop each tile to its NATO symbol
    Crop {
        #[arg(long)]
        tiles: PathBuf,

        #[arg(long)]
        out: PathBuf,
    },
    /// Create the template tree and fill its unsorted folders with unique crops
    Prepare {
        /// Directory of full unit tiles
        #[arg(long)]
        tiles: PathBuf,

        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Classify symbol crops against the sorted templates
    Classify {
        /// Root holding unit_type_templates/ and unit_formation_templates/
        #[arg(long, default_value = ".")]
        templates: PathBuf,

        /// Directory of symbol crops
        #[arg(long)]
        images: PathBuf,

        #[arg(long, default_value = "unit_tags.json")]
        out_json: PathBuf,

        #[arg(long, default_value = "purged.csv")]
        out_csv: PathBuf,

        /// JSON override table replacing the built-in one
        #[arg(long)]
        overrides: Option<PathBuf>,

        /// Minimum correlation score, overrides the config file
        #[arg(long)]
        threshold: Option<f32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = ToolConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Crop { tiles, out } => {
            let written = crop_tiles(&tiles, &out, config.tagging.tile_region)?;
            println!("✅ Cropped {} tiles into {}", written, out.display());
        }
        Commands::Prepare { tiles, out } => {
            let (formations, types) = harvest_templates(
                &tiles,
                &out,
                config.tagging.formation_template_region(),
                config.tagging.type_template_region(),
            )?;
            println!("✅ {} formation and {} type candidates ready to sort", formations, types);
        }
        Commands::Classify {
            templates,
            images,
            out_json,
            out_csv,
            overrides,
            threshold,
        } => {
            let mut tagging = config.tagging;
            if let Some(threshold) = threshold {
                tagging.threshold = threshold;
            }
            let overrides_path = overrides.or_else(|| tagging.overrides_path.clone());
            run_classify(tagging, &templates, &images, &out_json, &out_csv, overrides_path.as_deref()).await?;
        }
    }

    Ok(())
}

async fn run_classify(
    tagging: TaggingConfig,
    templates: &Path,
    images: &Path,
    out_json: &Path,
    out_csv: &Path,
    overrides: Option<&Path>,
) -> Result<()> {
    let overrides = match overrides {
        Some(path) => OverrideTable::from_file(path)?,
        None => OverrideTable::built_in(),
    };
    info!("{} override rules", overrides.len());

    let classifier = Arc::new(Classifier::load(templates, tagging));
    let computed = classify_directory(classifier, images).await?;

    let report = post_process(computed, &overrides);
    write_json(out_json, &report.records)?;
    write_exclusions_csv(out_csv, &report.excluded)?;

    println!("✅ {}", report.summary());
    Ok(())
}
