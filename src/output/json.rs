//! JSON output formatter.
//!
//! Provides machine-readable JSON output for scripting and automation.
//!
//! # Output Schema
//!
//! ```json
//! {
//!   "generated_at": "2026-01-01T12:00:00Z",
//!   "duplicates": [
//!     {
//!       "representative": "/photos/a.jpg",
//!       "files": ["/photos/a.jpg", "/photos/a_small.jpg"]
//!     }
//!   ],
//!   "summary": {
//!     "images_found": 100,
//!     "cache_hits": 90,
//!     "recomputed": 10,
//!     "skipped": 0,
//!     "duplicate_groups": 1,
//!     "duplicate_files": 1,
//!     "threshold": 5,
//!     "scan_duration_ms": 1234,
//!     "interrupted": false,
//!     "exit_code": 0,
//!     "exit_code_name": "PD000"
//!   }
//! }
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::ScanSummary;
use crate::duplicates::{DuplicateGroup, SimilarMatch};
use crate::error::ExitCode;

/// A single duplicate group in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonDuplicateGroup {
    /// The alphabetically first member
    pub representative: String,
    /// All members, sorted
    pub files: Vec<String>,
}

impl JsonDuplicateGroup {
    /// Create a JSON duplicate group from a DuplicateGroup.
    #[must_use]
    pub fn from_duplicate_group(group: &DuplicateGroup) -> Self {
        Self {
            representative: group.representative().map(path_string).unwrap_or_default(),
            files: group.files().iter().map(|p| path_string(p)).collect(),
        }
    }
}

/// Summary statistics in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSummary {
    /// Image files discovered
    pub images_found: usize,
    /// Fingerprints served from the cache
    pub cache_hits: usize,
    /// Fingerprints computed during this run
    pub recomputed: usize,
    /// Files that could not be decoded
    pub skipped: usize,
    /// Number of duplicate groups
    pub duplicate_groups: usize,
    /// Number of non-representative group members
    pub duplicate_files: usize,
    /// Similarity threshold used
    pub threshold: u32,
    /// Duration of the scan in milliseconds
    pub scan_duration_ms: u64,
    /// Whether the scan was interrupted
    pub interrupted: bool,
    /// The exit code number
    pub exit_code: i32,
    /// The machine-readable exit code name (e.g., "PD000")
    pub exit_code_name: String,
}

impl JsonSummary {
    /// Create a JSON summary from a ScanSummary and an exit code.
    #[must_use]
    pub fn from_scan_summary(summary: &ScanSummary, exit_code: ExitCode) -> Self {
        Self {
            images_found: summary.images_found,
            cache_hits: summary.cache_hits,
            recomputed: summary.recomputed,
            skipped: summary.skipped.len(),
            duplicate_groups: summary.duplicate_groups,
            duplicate_files: summary.duplicate_files,
            threshold: summary.threshold,
            scan_duration_ms: u64::try_from(summary.total_duration().as_millis()).unwrap_or(u64::MAX),
            interrupted: summary.interrupted,
            exit_code: exit_code.as_i32(),
            exit_code_name: exit_code.code_prefix().to_string(),
        }
    }
}

/// Complete JSON output for a scan.
#[derive(Debug, Clone, Serialize)]
pub struct JsonOutput {
    /// When the report was produced
    pub generated_at: DateTime<Utc>,
    /// List of duplicate groups
    pub duplicates: Vec<JsonDuplicateGroup>,
    /// Scan summary statistics
    pub summary: JsonSummary,
}

impl JsonOutput {
    /// Create a new JSON output from duplicate groups, summary and exit code.
    #[must_use]
    pub fn new(groups: &[DuplicateGroup], summary: &ScanSummary, exit_code: ExitCode) -> Self {
        Self {
            generated_at: Utc::now(),
            duplicates: groups
                .iter()
                .map(JsonDuplicateGroup::from_duplicate_group)
                .collect(),
            summary: JsonSummary::from_scan_summary(summary, exit_code),
        }
    }

    /// Serialize to compact JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails (unlikely for valid data).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty-printed JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails (unlikely for valid data).
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write pretty JSON followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), JsonOutputError> {
        write_json(self, writer)
    }
}

/// One match in a similarity report.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSimilarMatch {
    /// Matching image
    pub path: String,
    /// Hamming distance to the target
    pub distance: u32,
}

/// Complete JSON output for a similarity lookup.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSimilarOutput {
    /// When the report was produced
    pub generated_at: DateTime<Utc>,
    /// Image that was looked up
    pub target: String,
    /// Similarity threshold used
    pub threshold: u32,
    /// Matches, closest first
    pub matches: Vec<JsonSimilarMatch>,
}

impl JsonSimilarOutput {
    /// Create a JSON similarity report.
    #[must_use]
    pub fn new(target: &Path, threshold: u32, matches: &[SimilarMatch]) -> Self {
        Self {
            generated_at: Utc::now(),
            target: path_string(target),
            threshold,
            matches: matches
                .iter()
                .map(|m| JsonSimilarMatch {
                    path: path_string(&m.path),
                    distance: m.distance,
                })
                .collect(),
        }
    }

    /// Write pretty JSON followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), JsonOutputError> {
        write_json(self, writer)
    }
}

fn write_json<T: Serialize, W: Write>(value: &T, writer: &mut W) -> Result<(), JsonOutputError> {
    serde_json::to_writer_pretty(&mut *writer, value)?;
    writer.write_all(b"\n")?;
    Ok(())
}

fn path_string(path: &Path) -> String {
    PathBuf::from(path).to_string_lossy().into_owned()
}

/// Errors that can occur during JSON output.
#[derive(thiserror::Error, Debug)]
pub enum JsonOutputError {
    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error during writing
    #[error("I/O error during JSON generation: {0}")]
    Io(#[from] std::io::Error),
}
