//! Cache record definitions.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::scanner::Fingerprint;

/// Maximum length, in characters, of a stored identity.
pub const MAX_IDENTITY_LEN: usize = 1024;

/// One cached fingerprint, keyed by absolute path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashRecord {
    /// Absolute path of the image
    pub path: PathBuf,
    /// Fingerprint computed from the file's contents
    pub fingerprint: Fingerprint,
    /// File modification time at the moment of hashing, in epoch milliseconds
    pub mtime: i64,
}

impl HashRecord {
    /// Create a new record.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, fingerprint: Fingerprint, mtime: i64) -> Self {
        Self {
            path: path.into(),
            fingerprint,
            mtime,
        }
    }

    /// Whether this record still describes a file last modified at `mtime`.
    ///
    /// Equality is the only staleness signal: a file edited and restored
    /// to the same timestamp keeps its old fingerprint.
    #[must_use]
    pub fn is_valid_for(&self, mtime: i64) -> bool {
        self.mtime == mtime
    }

    /// The record's identity.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
