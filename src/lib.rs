//! photodupe - Perceptual Duplicate Image Finder
//!
//! Fingerprints images with a 64-bit average hash, caches fingerprints in
//! SQLite keyed by path and modification time, and groups images whose
//! fingerprints are within a Hamming-distance threshold.
//!
//! The pieces can be used on their own:
//!
//! * [`scanner`]: image discovery, decoding and fingerprinting
//! * [`cache`]: the modification-time validated [`cache::HashStore`]
//! * [`duplicates`]: parallel clustering and single-image similarity lookup
//! * [`output`]: text, JSON and CSV reports

pub mod cache;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod output;
pub mod progress;
pub mod scanner;
pub mod signal;

use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;

use crate::cache::{HashCache, HashStore, RecordStore, WarmOptions};
use crate::cli::{CacheAction, Cli, Commands, OutputFormat, ScanArgs, SimilarArgs};
use crate::config::Config;
use crate::duplicates::{ClusterEngine, DuplicateGroup, SimilarityLookup};
use crate::error::ExitCode;
use crate::output::csv::CsvSimilarOutput;
use crate::output::json::JsonSimilarOutput;
use crate::output::{CsvOutput, JsonOutput, ScanSummary, TextOutput};
use crate::progress::{Progress, ProgressCallback, PHASE_HASHING, PHASE_WALKING};
use crate::scanner::{discover_images, StandardDecoder};
use crate::signal::ShutdownHandler;

/// Run the command described by `cli` and report how it ended.
///
/// Interruption is not an error: it yields [`ExitCode::Interrupted`] after
/// whatever partial output is available has been written.
///
/// # Errors
///
/// Returns an error if configuration, the cache, or a command fails.
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);
    if cli.no_color || !io::stdout().is_terminal() {
        yansi::disable();
    }

    let mut config = match cli.config {
        Some(ref path) => Config::try_load_from_path(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::load(),
    };
    config.merge_cli(&cli);

    let shutdown = signal::install_handler().context("Failed to install Ctrl+C handler")?;
    let (store, cache_path) = open_store(&cli, &config)?;

    match cli.command {
        Commands::Scan(ref args) => {
            config.merge_scan_args(args);
            config.validate()?;
            run_scan(args, &config, &store, &shutdown, cli.quiet)
        }
        Commands::Similar(ref args) => {
            config.merge_similar_args(args);
            config.validate()?;
            run_similar(args, &config, &store)
        }
        Commands::Cache(ref args) => run_cache(args.action, &store, cache_path.as_deref()),
    }
}

fn open_store(cli: &Cli, config: &Config) -> anyhow::Result<(HashStore, Option<PathBuf>)> {
    let (records, path): (Arc<dyn RecordStore>, Option<PathBuf>) = if cli.no_cache {
        log::debug!("Using an in-memory fingerprint cache");
        (Arc::new(HashCache::in_memory()?), None)
    } else {
        let path = config.resolved_cache_path()?;
        let cache = HashCache::new(&path)
            .with_context(|| format!("Failed to open fingerprint cache at {}", path.display()))?;
        (Arc::new(cache), Some(path))
    };
    Ok((HashStore::new(records, Arc::new(StandardDecoder)), path))
}

fn run_scan(
    args: &ScanArgs,
    config: &Config,
    store: &HashStore,
    shutdown: &ShutdownHandler,
    quiet: bool,
) -> anyhow::Result<ExitCode> {
    let progress = Arc::new(Progress::new(quiet));
    let mut summary = ScanSummary {
        threshold: config.threshold,
        ..ScanSummary::default()
    };

    let started = Instant::now();
    let images = collect_images(&args.paths, config, shutdown, progress.as_ref())?;
    summary.images_found = images.len();
    if shutdown.is_shutdown_requested() {
        summary.interrupted = true;
        summary.hash_duration = started.elapsed();
        write_scan_output(config.output, &[], &summary, ExitCode::Interrupted)?;
        return Ok(ExitCode::Interrupted);
    }

    progress.on_phase_start(PHASE_HASHING, images.len());
    let options = WarmOptions::default()
        .with_shutdown_flag(shutdown.get_flag())
        .with_progress_callback(progress.clone());
    let warmed = store.warm(&images, &options).context("Fingerprint cache failed")?;
    progress.on_phase_end(PHASE_HASHING);

    summary.cache_hits = warmed.hits;
    summary.recomputed = warmed.recomputed;
    summary.skipped = warmed.failed;
    summary.hash_duration = started.elapsed();
    if warmed.interrupted {
        summary.interrupted = true;
        write_scan_output(config.output, &[], &summary, ExitCode::Interrupted)?;
        return Ok(ExitCode::Interrupted);
    }

    let entries = if args.whole_cache {
        store.get_all().context("Failed to read the fingerprint cache")?
    } else {
        warmed.fingerprints
    };
    summary.compared = entries.len();

    let started = Instant::now();
    let engine = ClusterEngine::new(
        config
            .cluster_config()
            .with_shutdown_flag(shutdown.get_flag())
            .with_progress_callback(progress),
    );
    let (groups, outcome) = engine.cluster_all(entries);
    summary.cluster_duration = started.elapsed();
    summary.interrupted = outcome.is_cancelled();
    summary.record_groups(&groups);

    let exit_code = if summary.interrupted {
        ExitCode::Interrupted
    } else {
        ExitCode::for_results(groups.len(), summary.skipped.len())
    };
    write_scan_output(config.output, &groups, &summary, exit_code)?;
    Ok(exit_code)
}

/// Walk every root and return the sorted, de-duplicated list of images.
fn collect_images(
    roots: &[PathBuf],
    config: &Config,
    shutdown: &ShutdownHandler,
    progress: &dyn ProgressCallback,
) -> anyhow::Result<Vec<PathBuf>> {
    let walker_config = config.walker_config();
    let mut images = Vec::new();

    progress.on_phase_start(PHASE_WALKING, 0);
    for root in roots {
        if shutdown.is_shutdown_requested() {
            break;
        }
        let root = std::path::absolute(root)
            .with_context(|| format!("Failed to resolve {}", root.display()))?;
        images.extend(discover_images(&root, &walker_config, Some(shutdown.get_flag()))?);
        progress.on_progress(images.len(), 0);
    }
    progress.on_phase_end(PHASE_WALKING);

    images.sort();
    images.dedup();
    log::info!("Found {} images in {} locations", images.len(), roots.len());
    Ok(images)
}

fn write_scan_output(
    format: OutputFormat,
    groups: &[DuplicateGroup],
    summary: &ScanSummary,
    exit_code: ExitCode,
) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match format {
        OutputFormat::Text => TextOutput::new(groups, summary).write_to(&mut out)?,
        OutputFormat::Json => JsonOutput::new(groups, summary, exit_code).write_to(&mut out)?,
        OutputFormat::Csv => CsvOutput::new(groups).write_to(&mut out)?,
    }
    out.flush()?;
    Ok(())
}

fn run_similar(args: &SimilarArgs, config: &Config, store: &HashStore) -> anyhow::Result<ExitCode> {
    let matches = SimilarityLookup::new(store)
        .with_threshold(config.threshold)
        .find(&args.file)
        .with_context(|| format!("Failed to look up {}", args.file.display()))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match config.output {
        OutputFormat::Text => {
            output::text::write_similar(&mut out, &args.file, config.threshold, &matches)?;
        }
        OutputFormat::Json => {
            JsonSimilarOutput::new(&args.file, config.threshold, &matches).write_to(&mut out)?;
        }
        OutputFormat::Csv => CsvSimilarOutput::new(&matches).write_to(&mut out)?,
    }
    out.flush()?;

    Ok(ExitCode::for_results(matches.len(), 0))
}

fn run_cache(action: CacheAction, store: &HashStore, path: Option<&Path>) -> anyhow::Result<ExitCode> {
    let mut out = io::stdout().lock();
    match action {
        CacheAction::Stats => {
            match path {
                Some(path) => writeln!(out, "Cache:   {}", path.display())?,
                None => writeln!(out, "Cache:   (in memory)")?,
            }
            writeln!(out, "Records: {}", store.len()?)?;
        }
        CacheAction::Prune => {
            let removed = store.prune_missing()?;
            writeln!(out, "Removed {} records for missing files", removed)?;
        }
        CacheAction::Clear => {
            let removed = store.clear()?;
            writeln!(out, "Removed {} records", removed)?;
        }
    }
    Ok(ExitCode::Success)
}
