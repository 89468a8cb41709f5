//! Command-line interface definitions for photodupe.
//!
//! This module defines all CLI arguments, subcommands, and options using the
//! clap derive API. Options that also exist in the configuration file are
//! `Option`s here so that "not given" can be told apart from "given", and
//! only given flags override the loaded [`Config`](crate::config::Config).
//!
//! # Example
//!
//! ```bash
//! # Find duplicate groups under a directory
//! photodupe scan ~/Pictures
//!
//! # Looser matching, JSON output for scripting
//! photodupe scan ~/Pictures --threshold 8 --output json
//!
//! # Which cached images look like this one?
//! photodupe similar ~/Pictures/beach.jpg
//!
//! # Drop cache records for deleted files
//! photodupe cache prune
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

/// Perceptual-hash duplicate image finder.
///
/// photodupe fingerprints images with a 64-bit average hash, caches the
/// fingerprints in SQLite, and groups images whose fingerprints differ in
/// only a few bits: resized, recompressed or lightly edited copies.
#[derive(Debug, Parser)]
#[command(name = "photodupe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Print errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Configuration file to use instead of the platform default
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Path to the fingerprint cache database
    ///
    /// If not specified, a default platform-specific path is used.
    #[arg(long, value_name = "DB", global = true)]
    pub cache: Option<PathBuf>,

    /// Keep fingerprints in memory only for this run
    #[arg(long, global = true, conflicts_with = "cache")]
    pub no_cache: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Find groups of duplicate images
    Scan(ScanArgs),
    /// List cached images similar to one image
    Similar(SimilarArgs),
    /// Inspect or maintain the fingerprint cache
    Cache(CacheArgs),
}

/// Arguments for the scan subcommand.
#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Directories to scan for images
    #[arg(value_name = "PATH", required_unless_present = "whole_cache")]
    pub paths: Vec<PathBuf>,

    /// Maximum differing bits for two images to match (0-64, default 5)
    #[arg(short, long, value_name = "BITS", value_parser = clap::value_parser!(u32).range(0..=64))]
    pub threshold: Option<u32>,

    /// Comparison threads (default: one per core)
    #[arg(short = 'j', long, value_name = "N")]
    pub workers: Option<usize>,

    /// Output format
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,

    /// Cluster every cached fingerprint, not just the scanned paths
    #[arg(long)]
    pub whole_cache: bool,

    /// Include hidden files and directories (starting with .)
    #[arg(long)]
    pub include_hidden: bool,

    /// Follow symbolic links during scan
    ///
    /// Warning: May cause infinite loops if symlinks form cycles.
    #[arg(long)]
    pub follow_symlinks: bool,
}

/// Arguments for the similar subcommand.
#[derive(Debug, Args)]
pub struct SimilarArgs {
    /// Image to compare against the cache
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Maximum differing bits for a match (0-64, default 5)
    #[arg(short, long, value_name = "BITS", value_parser = clap::value_parser!(u32).range(0..=64))]
    pub threshold: Option<u32>,

    /// Output format
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,
}

/// Arguments for the cache subcommand.
#[derive(Debug, Args)]
pub struct CacheArgs {
    /// Maintenance action
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache maintenance actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum CacheAction {
    /// Show the cache location and record count
    Stats,
    /// Remove records for files that no longer exist
    Prune,
    /// Remove every record
    Clear,
}

/// Output format for results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable, colored text
    #[default]
    Text,
    /// JSON output for scripting
    Json,
    /// CSV output for spreadsheets
    Csv,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}
