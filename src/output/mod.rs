//! Output formatters for scan and lookup results.
//!
//! This module provides different output formats:
//! - Colored text for terminals
//! - JSON for automation and scripting
//! - CSV for spreadsheet import
//!
//! # Example
//!
//! ```
//! use photodupe::duplicates::DuplicateGroup;
//! use photodupe::error::ExitCode;
//! use photodupe::output::{json::JsonOutput, ScanSummary};
//! use std::path::PathBuf;
//!
//! let groups = vec![DuplicateGroup::new(vec![
//!     PathBuf::from("/photos/a.jpg"),
//!     PathBuf::from("/photos/a_small.jpg"),
//! ])];
//! let summary = ScanSummary::default();
//!
//! let output = JsonOutput::new(&groups, &summary, ExitCode::Success);
//! println!("{}", output.to_json_pretty().unwrap());
//! ```

use std::path::PathBuf;
use std::time::Duration;

use crate::duplicates::DuplicateGroup;

pub mod csv;
pub mod json;
pub mod text;

// Re-export main types
pub use self::csv::CsvOutput;
pub use self::json::JsonOutput;
pub use self::text::TextOutput;

/// Counters collected over one `scan` run.
#[derive(Debug, Clone, Default)]
pub struct ScanSummary {
    /// Image files discovered by walking
    pub images_found: usize,
    /// Fingerprints served from the cache
    pub cache_hits: usize,
    /// Fingerprints decoded during this run
    pub recomputed: usize,
    /// Files that could not be decoded
    pub skipped: Vec<PathBuf>,
    /// Fingerprints that went into clustering
    pub compared: usize,
    /// Duplicate groups found
    pub duplicate_groups: usize,
    /// Files that are not a group's representative
    pub duplicate_files: usize,
    /// Threshold used
    pub threshold: u32,
    /// Time spent fingerprinting
    pub hash_duration: Duration,
    /// Time spent clustering
    pub cluster_duration: Duration,
    /// Whether the run was cancelled
    pub interrupted: bool,
}

impl ScanSummary {
    /// Record the groups found.
    pub fn record_groups(&mut self, groups: &[DuplicateGroup]) {
        self.duplicate_groups = groups.len();
        self.duplicate_files = groups.iter().map(|g| g.duplicates().len()).sum();
    }

    /// Total elapsed time.
    #[must_use]
    pub fn total_duration(&self) -> Duration {
        self.hash_duration + self.cluster_duration
    }
}
