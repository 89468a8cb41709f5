//! Human-readable terminal output.
//!
//! Colors come from yansi and are dropped when the global switch is off
//! (`--no-color`, `NO_COLOR`, or a non-terminal stdout).

use std::io::{self, Write};
use std::path::Path;

use yansi::Paint;

use super::ScanSummary;
use crate::duplicates::{DuplicateGroup, SimilarMatch};

/// Text formatter for duplicate groups.
pub struct TextOutput<'a> {
    groups: &'a [DuplicateGroup],
    summary: &'a ScanSummary,
}

impl<'a> TextOutput<'a> {
    /// Create a new text formatter.
    #[must_use]
    pub fn new(groups: &'a [DuplicateGroup], summary: &'a ScanSummary) -> Self {
        Self { groups, summary }
    }

    /// Write groups followed by a summary block.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        for (idx, group) in self.groups.iter().enumerate() {
            writeln!(
                writer,
                "{} ({} images)",
                format!("Group {}", idx + 1).bold(),
                group.len()
            )?;
            if let Some(rep) = group.representative() {
                writeln!(writer, "  {} {}", "*".green(), rep.display().green())?;
            }
            for path in group.duplicates() {
                writeln!(writer, "    {}", path.display())?;
            }
            writeln!(writer)?;
        }

        let s = self.summary;
        if s.interrupted {
            writeln!(writer, "{}", "Scan interrupted; results are partial.".yellow().bold())?;
        }
        writeln!(
            writer,
            "{} {} images ({} cached, {} decoded), {} skipped",
            "Scanned".bold(),
            s.images_found,
            s.cache_hits,
            s.recomputed,
            s.skipped.len()
        )?;
        if self.groups.is_empty() {
            writeln!(writer, "No duplicates found (threshold {}).", s.threshold)?;
        } else {
            writeln!(
                writer,
                "{} {} groups, {} duplicate images (threshold {})",
                "Found".bold(),
                s.duplicate_groups.cyan(),
                s.duplicate_files.cyan(),
                s.threshold
            )?;
        }
        for path in &s.skipped {
            writeln!(writer, "  {} {}", "skipped:".red(), path.display())?;
        }
        writeln!(writer, "Completed in {:.2?}", s.total_duration())
    }
}

/// Write a similarity lookup as text.
///
/// # Errors
///
/// Returns an I/O error if writing fails.
pub fn write_similar<W: Write>(
    writer: &mut W,
    target: &Path,
    threshold: u32,
    matches: &[SimilarMatch],
) -> io::Result<()> {
    if matches.is_empty() {
        return writeln!(
            writer,
            "No cached images within {} bits of {}",
            threshold,
            target.display()
        );
    }
    writeln!(
        writer,
        "{} images similar to {}",
        matches.len().bold(),
        target.display().bold()
    )?;
    for m in matches {
        writeln!(writer, "  {}  {}", format!("{:>2}", m.distance).cyan(), m.path.display())?;
    }
    Ok(())
}
