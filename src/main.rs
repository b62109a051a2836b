use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::time::Instant;

use tagmate::artwork::HttpArtwork;
use tagmate::catalog::{CatalogIndex, JsonPlaylist};
use tagmate::classify::{classify_directory, promote_classified};
use tagmate::config::{Config, Mode};
use tagmate::library::{local_stems, scan_groups};
use tagmate::lookup::HttpLookup;
use tagmate::models::RunStats;
use tagmate::progress::{catalog_spinner, elapsed_label, use_plain_output};
use tagmate::report::{
    export_catalog_keys, export_failures, export_report, export_unmatched, reconcile,
};
use tagmate::safety::validate_layout;
use tagmate::selection::TerminalSelection;
use tagmate::tagger::{GenreResolver, Tagger};
use tagmate::tags::LoftyTagStore;

#[derive(Parser)]
#[command(name = "tagmate")]
#[command(about = "Tag, classify and reconcile a local music library against its catalog playlist")]
struct Args {
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// JSON export of the library's catalog playlist
    #[arg(long)]
    catalog: PathBuf,

    /// Override the mode set in the config file
    #[arg(long, value_enum)]
    mode: Option<Mode>,

    /// Directory for the exported lists
    #[arg(long, default_value = "output")]
    output: PathBuf,

    /// Hide progress bars, print tail-friendly progress lines instead
    #[arg(long)]
    log_only: bool,

    /// Write run statistics as JSON to this file
    #[arg(long)]
    stats: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let start = Instant::now();

    let mut config = Config::load(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    // Genre prompts and progress bars would fight over the terminal
    use_plain_output(args.log_only || config.mode == Mode::Manual);

    let layout = config.layout();
    validate_layout(&layout, &args.output)?;
    layout.ensure().context("Failed to create library directories")?;
    std::fs::create_dir_all(&args.output).context("Failed to create output directory")?;

    let mut stats = RunStats::default();

    // Catalog
    let spinner = catalog_spinner(&config.catalog_ref);
    let playlist = JsonPlaylist::from_path(&args.catalog)
        .with_context(|| format!("Failed to read {}", args.catalog.display()))?;
    let index = CatalogIndex::build(&playlist, &config.catalog_ref)?;
    spinner.finish_and_clear();
    let catalog_keys: Vec<String> = index.keys().map(str::to_string).collect();
    export_catalog_keys(&args.output, &catalog_keys)?;
    info!(
        "Catalog '{}' has {} tracks ({} duplicate keys)",
        config.library_name,
        index.len(),
        index.collisions()
    );

    // Tagging
    let groups = scan_groups(&layout.working)
        .with_context(|| format!("Failed to scan {}", layout.working.display()))?;
    info!("Found {} track groups to tag", groups.len());

    let store = LoftyTagStore;
    let artwork = HttpArtwork::new()?;
    let tag_report = match config.mode {
        Mode::Manual => {
            let mut terminal = TerminalSelection::stdio(config.genres.clone());
            Tagger::new(
                &config.library_name,
                &layout,
                &store,
                &artwork,
                GenreResolver::Manual(&mut terminal),
            )
            .with_query_separator(&config.query_separator)
            .run(&groups, &index, &mut stats)?
        }
        Mode::Automatic => {
            let lookup = HttpLookup::new()?;
            Tagger::new(
                &config.library_name,
                &layout,
                &store,
                &artwork,
                GenreResolver::Automatic(&lookup),
            )
            .with_query_separator(&config.query_separator)
            .run(&groups, &index, &mut stats)?
        }
    };
    export_unmatched(&args.output, &tag_report.unmatched)?;
    export_failures(&args.output, &tag_report.failures)?;

    // Classification
    let classified = classify_directory(&layout.working, &config.library_name, &store)?;
    stats.primaries = classified.primaries;
    stats.substitutes = classified.substitutes;
    stats.grammar_violations = classified.violations.len();
    stats.other_failures += classified.failures.len();
    stats.promoted = promote_classified(
        &layout.working,
        &layout.collection,
        &config.library_name,
        &store,
    )?;

    // Reconciliation
    let stems = local_stems(&layout.collection)?;
    let report = reconcile(&catalog_keys, &stems);
    stats.missing_from_local = report.missing_from_local.len();
    stats.missing_from_catalog = report.missing_from_catalog.len();
    export_report(&args.output, &report)?;

    let elapsed = start.elapsed();
    stats.elapsed_seconds = elapsed.as_secs_f64();
    stats.log_phase("run");
    if let Some(path) = &args.stats {
        stats.write_to_file(path)?;
    }

    println!("\n{:=<60}", "");
    println!("Run complete!");
    println!("  Tagged: {} of {} groups", stats.tagged, stats.groups_seen);
    println!("  Flagged for review: {}", tag_report.flagged.len());
    println!(
        "  Classified: {} primary, {} substitute ({} violations)",
        stats.primaries, stats.substitutes, stats.grammar_violations
    );
    println!("  Promoted to collection: {}", stats.promoted);
    println!("  Missing from local: {}", stats.missing_from_local);
    println!("  Missing from catalog: {}", stats.missing_from_catalog);
    println!("  Elapsed: {}", elapsed_label(elapsed));
    println!("{:=<60}", "");

    Ok(())
}
