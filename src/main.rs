// Red Strike Converter - CLI
// convert: buildFile.xml + CloudInfo.bson → factions / cards / markers JSON
// package: factions + cards JSON → Tabletop Simulator save

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use redstrike_tts::tree_walker::read_json_map;
use redstrike_tts::{
    flatten, parse_document, parse_module, write_json, AssociationTable, ConversionReport, ObjectTemplates,
    Packager, ToolConfig,
};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "redstrike")]
#[command(about = "Red Strike VASSAL module converter", version, long_about = None)]
struct Cli {
    /// JSON config file; defaults apply when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export the module's pieces as nested JSON
    Convert {
        /// Extracted buildFile.xml
        #[arg(long)]
        buildfile: PathBuf,

        /// Image hosting table (CloudInfo.bson)
        #[arg(long)]
        bson: PathBuf,

        /// Output prefix, e.g. `Red_Strike_V1_2.vmod`
        #[arg(long)]
        out_stem: PathBuf,
    },
    /// Build a Tabletop Simulator save from exported JSON
    Package {
        #[arg(long)]
        factions: PathBuf,

        #[arg(long)]
        cards: PathBuf,

        #[arg(short, long, default_value = "RS89_Tokens.json")]
        out: PathBuf,

        /// Object templates replacing the embedded ones
        #[arg(long)]
        templates: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = ToolConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Convert { buildfile, bson, out_stem } => run_convert(&config, &buildfile, &bson, &out_stem),
        Commands::Package {
            factions,
            cards,
            out,
            templates,
        } => run_package(&config, &factions, &cards, &out, templates),
    }
}

fn run_convert(config: &ToolConfig, buildfile: &Path, bson: &Path, out_stem: &Path) -> Result<()> {
    println!("🗺️  Converting VASSAL module");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // 1. Association table
    let file = File::open(bson).with_context(|| format!("Failed to open {}", bson.display()))?;
    let table = AssociationTable::from_bson_reader(BufReader::new(file))
        .with_context(|| format!("Failed to decode {}", bson.display()))?;
    info!("loaded {} image associations", table.len());

    // 2. Module tree
    let xml = fs::read_to_string(buildfile).with_context(|| format!("Failed to read {}", buildfile.display()))?;
    let document = parse_document(&xml).with_context(|| format!("Failed to parse {}", buildfile.display()))?;
    let module = parse_module(&document, &table, &config.card_backs)?;

    // 3. Exports
    let outputs = [
        ("factions", flatten(&module.factions)),
        ("cards", flatten(&module.deck_nodes())),
        ("markers", flatten(&module.marker_nodes())),
    ];
    for (suffix, document) in &outputs {
        let path = suffixed(out_stem, suffix);
        write_json(&path, document)?;
        println!("✓ Wrote {}", path.display());
    }

    // 4. Report
    let report = ConversionReport::from_module(&module);
    for leaf in &report.unresolved {
        warn!(
            "unresolved image for '{}' (front: {}, back: {})",
            leaf.path, !leaf.missing_front, !leaf.missing_back
        );
    }
    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✅ {}", report.summary());

    Ok(())
}

fn run_package(
    config: &ToolConfig,
    factions: &Path,
    cards: &Path,
    out: &Path,
    templates: Option<PathBuf>,
) -> Result<()> {
    println!("🎲 Packaging Tabletop Simulator save");

    let templates_path = templates.or_else(|| config.packaging.templates_path.clone());
    let templates = ObjectTemplates::load(templates_path.as_deref())?;

    let factions = read_json_map(factions)?;
    let cards = read_json_map(cards)?;

    let save = Packager::new(&templates).build_save(&factions, &cards, &config.packaging)?;
    write_json(out, &save)?;

    println!("✅ Wrote {}", out.display());
    Ok(())
}

/// `<stem>_<suffix>.json` next to the stem
fn suffixed(stem: &Path, suffix: &str) -> PathBuf {
    let mut name = stem.as_os_str().to_os_string();
    name.push(format!("_{}.json", suffix));
    PathBuf::from(name)
}
