//! Report-only run: rebuild the catalog index and compare it with the
//! finished collection. No file is tagged or moved.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use tagmate::catalog::{CatalogIndex, JsonPlaylist};
use tagmate::config::Config;
use tagmate::library::local_stems;
use tagmate::report::{export_catalog_keys, export_report, reconcile};

#[derive(Parser)]
#[command(name = "reconcile")]
#[command(about = "Compare the catalog playlist with the finished local collection")]
struct Args {
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// JSON export of the library's catalog playlist
    #[arg(long)]
    catalog: PathBuf,

    #[arg(long, default_value = "output")]
    output: PathBuf,

    /// Print the lists instead of only their sizes
    #[arg(long)]
    verbose: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = Config::load(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    let collection = config.layout().collection;

    let playlist = JsonPlaylist::from_path(&args.catalog)
        .with_context(|| format!("Failed to read {}", args.catalog.display()))?;
    let index = CatalogIndex::build(&playlist, &config.catalog_ref)?;
    let keys: Vec<String> = index.keys().map(str::to_string).collect();

    let stems = local_stems(&collection)
        .with_context(|| format!("Failed to scan {}", collection.display()))?;
    let report = reconcile(&keys, &stems);

    export_report(&args.output, &report)?;
    export_catalog_keys(&args.output, &keys)?;

    println!("Catalog: {} tracks, collection: {} tracks", keys.len(), stems.len());
    println!("  Missing from local: {}", report.missing_from_local.len());
    println!("  Missing from catalog: {}", report.missing_from_catalog.len());
    if args.verbose {
        for key in &report.missing_from_local {
            println!("    - {}", key);
        }
        for stem in &report.missing_from_catalog {
            println!("    + {}", stem);
        }
    }

    Ok(())
}
