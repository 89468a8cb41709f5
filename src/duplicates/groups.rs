//! Duplicate groups produced by clustering.
//!
//! # Example
//!
//! ```
//! use photodupe::duplicates::DuplicateGroup;
//! use std::path::PathBuf;
//!
//! let group = DuplicateGroup::new(vec![
//!     PathBuf::from("/photos/b.jpg"),
//!     PathBuf::from("/photos/a.jpg"),
//! ]);
//!
//! assert_eq!(group.representative(), Some(PathBuf::from("/photos/a.jpg").as_path()));
//! assert_eq!(group.duplicates().len(), 1);
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A connected set of near-identical images.
///
/// Members are kept sorted by full path; the first member is the group's
/// representative. The ordering is a fixed contract so reports are stable
/// across runs and thread counts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// Member paths, sorted ascending
    files: Vec<PathBuf>,
}

impl DuplicateGroup {
    /// Create a group, sorting and de-duplicating `files`.
    #[must_use]
    pub fn new(mut files: Vec<PathBuf>) -> Self {
        files.sort();
        files.dedup();
        Self { files }
    }

    /// The alphabetically first member.
    #[must_use]
    pub fn representative(&self) -> Option<&Path> {
        self.files.first().map(PathBuf::as_path)
    }

    /// Every member except the representative.
    #[must_use]
    pub fn duplicates(&self) -> &[PathBuf] {
        self.files.get(1..).unwrap_or(&[])
    }

    /// All members in order.
    #[must_use]
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Consume the group, returning its members.
    #[must_use]
    pub fn into_files(self) -> Vec<PathBuf> {
        self.files
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if this group is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Whether `path` is a member.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.files.binary_search_by(|p| p.as_path().cmp(path)).is_ok()
    }
}

/// Sort groups for presentation: largest first, then by representative.
pub fn sort_groups(groups: &mut [DuplicateGroup]) {
    groups.sort_by(|a, b| {
        b.len()
            .cmp(&a.len())
            .then_with(|| a.representative().cmp(&b.representative()))
    });
}
