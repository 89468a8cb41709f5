//! SQLite-backed fingerprint cache database.
//!
//! The [`RecordStore`] trait is the narrow persistence seam used by
//! [`HashStore`](super::HashStore); [`HashCache`] is its SQLite implementation.
//!
//! Records live in a single table:
//!
//! ```sql
//! CREATE TABLE image_hashes (
//!     file_path     TEXT PRIMARY KEY,
//!     hash          INTEGER NOT NULL,
//!     last_modified INTEGER NOT NULL
//! );
//! ```
//!
//! The 64-bit fingerprint is stored bit-for-bit in the signed `INTEGER`
//! column. The schema version is stamped in `PRAGMA user_version`.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

use super::entry::{HashRecord, MAX_IDENTITY_LEN};
use crate::scanner::Fingerprint;

/// Current schema version written to `user_version`.
const SCHEMA_VERSION: i64 = 1;

/// How long a writer waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors raised by the persistent store.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Any failure reported by SQLite, including a corrupted database file.
    #[error("Cache database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Another thread panicked while holding the connection.
    #[error("Cache lock poisoned")]
    LockPoisoned,

    /// The identity exceeds the storable length.
    #[error("Path too long for cache ({len} characters, max 1024): {path}")]
    IdentityTooLong {
        /// The offending path
        path: PathBuf,
        /// Its length in characters
        len: usize,
    },

    /// The identity is not valid UTF-8 and cannot be stored losslessly.
    #[error("Path is not valid UTF-8: {}", path.display())]
    NonUtf8Identity {
        /// The offending path
        path: PathBuf,
    },

    /// The database was written by a newer, incompatible version.
    #[error("Unsupported cache schema version {found}")]
    UnsupportedSchema {
        /// Version found in the file
        found: i64,
    },

    /// The database directory could not be created.
    #[error("Cache I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl CacheError {
    /// Whether the error concerns one identity only, leaving the store usable.
    #[must_use]
    pub fn is_per_record(&self) -> bool {
        matches!(self, Self::IdentityTooLong { .. } | Self::NonUtf8Identity { .. })
    }
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Keyed persistence for [`HashRecord`]s.
///
/// Implementations must be safe to share between threads; every method is a
/// single atomic operation.
pub trait RecordStore: Send + Sync {
    /// Insert or overwrite the record for `record.path`.
    fn upsert(&self, record: &HashRecord) -> CacheResult<()>;

    /// Fetch the record for `path`, if any.
    fn lookup(&self, path: &Path) -> CacheResult<Option<HashRecord>>;

    /// Every stored record, ordered by path.
    fn scan_all(&self) -> CacheResult<Vec<HashRecord>>;

    /// Delete the record for `path`. Returns whether one existed.
    fn remove(&self, path: &Path) -> CacheResult<bool>;

    /// Delete every record. Returns how many were removed.
    fn clear(&self) -> CacheResult<usize>;

    /// Number of stored records.
    fn len(&self) -> CacheResult<usize>;

    /// Whether the store holds no records.
    fn is_empty(&self) -> CacheResult<bool> {
        Ok(self.len()? == 0)
    }
}

/// Persistent fingerprint cache using SQLite.
pub struct HashCache {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for HashCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashCache").field("path", &self.path).finish()
    }
}

impl HashCache {
    /// Open or create a cache database at `path`.
    ///
    /// Missing parent directories are created.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the directory cannot be created, the file is
    /// not a valid SQLite database, or the schema cannot be initialized.
    pub fn new(path: &Path) -> CacheResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| CacheError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        let cache = Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        };
        cache.initialize_schema()?;

        log::debug!("Opened fingerprint cache at {}", path.display());
        Ok(cache)
    }

    /// Create an ephemeral cache that lives only as long as this value.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if SQLite cannot allocate the database.
    pub fn in_memory() -> CacheResult<Self> {
        let cache = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
            path: None,
        };
        cache.initialize_schema()?;
        Ok(cache)
    }

    /// Location of the database file, or `None` for an in-memory cache.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn initialize_schema(&self) -> CacheResult<()> {
        let conn = self.lock()?;

        let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
        if version > SCHEMA_VERSION {
            return Err(CacheError::UnsupportedSchema { found: version });
        }

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS image_hashes (
                file_path     TEXT PRIMARY KEY CHECK(length(file_path) <= 1024),
                hash          INTEGER NOT NULL,
                last_modified INTEGER NOT NULL
            );",
        )?;

        if version < SCHEMA_VERSION {
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        }
        Ok(())
    }

    fn lock(&self) -> CacheResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| CacheError::LockPoisoned)
    }
}

/// Text key for a path, matching the `length(file_path)` column check.
fn identity_key(path: &Path) -> CacheResult<&str> {
    let Some(key) = path.to_str() else {
        return Err(CacheError::NonUtf8Identity {
            path: path.to_path_buf(),
        });
    };
    let len = key.chars().count();
    if len > MAX_IDENTITY_LEN {
        return Err(CacheError::IdentityTooLong {
            path: path.to_path_buf(),
            len,
        });
    }
    Ok(key)
}

#[allow(clippy::cast_possible_wrap)]
fn to_column(fingerprint: Fingerprint) -> i64 {
    fingerprint.bits() as i64
}

#[allow(clippy::cast_sign_loss)]
fn from_column(value: i64) -> Fingerprint {
    Fingerprint::from_bits(value as u64)
}

impl RecordStore for HashCache {
    fn upsert(&self, record: &HashRecord) -> CacheResult<()> {
        let key = identity_key(&record.path)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO image_hashes (file_path, hash, last_modified) VALUES (?1, ?2, ?3)
             ON CONFLICT(file_path) DO UPDATE SET
                 hash = excluded.hash,
                 last_modified = excluded.last_modified",
            params![key, to_column(record.fingerprint), record.mtime],
        )?;
        Ok(())
    }

    fn lookup(&self, path: &Path) -> CacheResult<Option<HashRecord>> {
        let key = identity_key(path)?;
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT hash, last_modified FROM image_hashes WHERE file_path = ?1",
                params![key],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;

        Ok(row.map(|(hash, mtime)| HashRecord::new(path, from_column(hash), mtime)))
    }

    fn scan_all(&self) -> CacheResult<Vec<HashRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT file_path, hash, last_modified FROM image_hashes ORDER BY file_path")?;
        let rows = stmt.query_map([], |row| {
            Ok(HashRecord::new(
                PathBuf::from(row.get::<_, String>(0)?),
                from_column(row.get(1)?),
                row.get(2)?,
            ))
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(CacheError::from)
    }

    fn remove(&self, path: &Path) -> CacheResult<bool> {
        let key = identity_key(path)?;
        let conn = self.lock()?;
        let removed = conn.execute("DELETE FROM image_hashes WHERE file_path = ?1", params![key])?;
        Ok(removed > 0)
    }

    fn clear(&self) -> CacheResult<usize> {
        let conn = self.lock()?;
        Ok(conn.execute("DELETE FROM image_hashes", [])?)
    }

    fn len(&self) -> CacheResult<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM image_hashes", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}
