//! CSV output formatter for scan and lookup results.
//!
//! Provides machine-readable CSV output for spreadsheets and data analysis.
//! One row is generated for each image.
//!
//! # Columns
//!
//! Duplicate groups:
//!
//! - `group_id`: Numeric ID identifying the duplicate group
//! - `representative`: `true` for the group's alphabetically first member
//! - `path`: Absolute path to the image
//! - `modified`: Last modified time (RFC 3339 format)
//!
//! Similarity lookups use `path,distance`.
//!
//! # Example
//!
//! ```
//! use photodupe::duplicates::DuplicateGroup;
//! use photodupe::output::csv::CsvOutput;
//! use std::path::PathBuf;
//!
//! let groups = vec![DuplicateGroup::new(vec![
//!     PathBuf::from("/p/a.jpg"),
//!     PathBuf::from("/p/b.jpg"),
//! ])];
//! let csv = CsvOutput::new(&groups).to_string().unwrap();
//! assert!(csv.starts_with("group_id,representative,path,modified"));
//! ```

use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::duplicates::{DuplicateGroup, SimilarMatch};

/// Errors that can occur during CSV output generation.
#[derive(Debug, Error)]
pub enum CsvOutputError {
    /// I/O error during writing.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Error during CSV serialization.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Serialize)]
struct GroupRow {
    group_id: usize,
    representative: bool,
    path: String,
    modified: String,
}

#[derive(Debug, Serialize)]
struct SimilarRow {
    path: String,
    distance: u32,
}

/// CSV output formatter for duplicate groups.
pub struct CsvOutput<'a> {
    groups: &'a [DuplicateGroup],
}

impl<'a> CsvOutput<'a> {
    /// Create a new CSV output formatter.
    #[must_use]
    pub fn new(groups: &'a [DuplicateGroup]) -> Self {
        Self { groups }
    }

    /// Write the CSV output to the given writer.
    ///
    /// # Errors
    ///
    /// Returns `CsvOutputError` if writing or serialization fails.
    pub fn write_to<W: io::Write>(&self, writer: W) -> Result<(), CsvOutputError> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        if self.groups.is_empty() {
            csv_writer.write_record(["group_id", "representative", "path", "modified"])?;
        }

        for (idx, group) in self.groups.iter().enumerate() {
            let representative = group.representative();
            for path in group.files() {
                csv_writer.serialize(GroupRow {
                    group_id: idx + 1,
                    representative: representative == Some(path.as_path()),
                    path: path.to_string_lossy().into_owned(),
                    modified: get_modified_time(path),
                })?;
            }
        }

        csv_writer.flush()?;
        Ok(())
    }

    /// Generate CSV output as a string.
    ///
    /// # Errors
    ///
    /// Returns `CsvOutputError` if serialization fails.
    pub fn to_string(&self) -> Result<String, CsvOutputError> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

/// CSV output formatter for a similarity lookup.
pub struct CsvSimilarOutput<'a> {
    matches: &'a [SimilarMatch],
}

impl<'a> CsvSimilarOutput<'a> {
    /// Create a new formatter.
    #[must_use]
    pub fn new(matches: &'a [SimilarMatch]) -> Self {
        Self { matches }
    }

    /// Write the CSV output to the given writer.
    ///
    /// # Errors
    ///
    /// Returns `CsvOutputError` if writing or serialization fails.
    pub fn write_to<W: io::Write>(&self, writer: W) -> Result<(), CsvOutputError> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        if self.matches.is_empty() {
            csv_writer.write_record(["path", "distance"])?;
        }
        for m in self.matches {
            csv_writer.serialize(SimilarRow {
                path: m.path.to_string_lossy().into_owned(),
                distance: m.distance,
            })?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}

/// Formatted modified time for a file, or "unknown" if metadata cannot be read.
fn get_modified_time(path: &Path) -> String {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map(|m| {
            let datetime: DateTime<Utc> = m.into();
            datetime.to_rfc3339()
        })
        .unwrap_or_else(|_| "unknown".to_string())
}
