//! Staleness-aware fingerprint cache.
//!
//! [`HashStore`] answers "what is the fingerprint of this file?" by
//! consulting a [`RecordStore`] first and falling back to decoding the image.
//! A stored record is trusted only while its modification time equals the
//! file's current one; anything else is treated exactly like a miss.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use rayon::prelude::*;
use thiserror::Error;

use super::database::{CacheError, RecordStore};
use super::entry::HashRecord;
use crate::progress::ProgressCallback;
use crate::scanner::{fingerprint_image, DecodeError, Fingerprint, ImageDecoder};

/// Failure to produce a fingerprint for one identity.
#[derive(Debug, Error)]
pub enum HashStoreError {
    /// The file could not be read or decoded. Recoverable per file.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The persistent store failed.
    #[error(transparent)]
    Store(#[from] CacheError),
}

impl HashStoreError {
    /// Whether this is a per-file decoding problem rather than a store failure.
    #[must_use]
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_))
    }

    /// Whether only this file is affected: it failed to decode, or its path
    /// cannot be used as a cache key.
    #[must_use]
    pub fn is_per_file(&self) -> bool {
        match self {
            Self::Decode(_) => true,
            Self::Store(e) => e.is_per_record(),
        }
    }
}

/// Where a fingerprint came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// A valid record was found; the decoder was not called.
    Hit,
    /// The record was missing or stale and the image was decoded again.
    Recomputed,
}

/// A fingerprint together with how it was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fetched {
    /// The fingerprint
    pub fingerprint: Fingerprint,
    /// Whether it came from the cache
    pub status: CacheStatus,
}

/// Options for [`HashStore::warm`].
#[derive(Default)]
pub struct WarmOptions {
    /// Stop early once this flag is set.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Receives `(processed, total)` after every file.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for WarmOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WarmOptions")
            .field("shutdown_flag", &self.shutdown_flag)
            .field("progress_callback", &self.progress_callback.is_some())
            .finish()
    }
}

impl WarmOptions {
    /// Set the shutdown flag.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }
}

/// Counters and results of a [`HashStore::warm`] pass.
#[derive(Debug, Default)]
pub struct WarmSummary {
    /// Fingerprints served from the cache
    pub hits: usize,
    /// Fingerprints decoded and stored
    pub recomputed: usize,
    /// Files skipped because they could not be decoded
    pub failed: Vec<PathBuf>,
    /// Whether the pass stopped before visiting every file
    pub interrupted: bool,
    /// `(identity, fingerprint)` for every file that succeeded, sorted by path
    pub fingerprints: Vec<(PathBuf, Fingerprint)>,
}

/// Fingerprint cache validated against file modification times.
///
/// Cheap to share: wrap it in an [`Arc`] or pass `&HashStore` around.
/// Two threads asking for the same stale file may both decode it; both
/// write the same record, so the race is harmless.
#[derive(Clone)]
pub struct HashStore {
    records: Arc<dyn RecordStore>,
    decoder: Arc<dyn ImageDecoder>,
}

impl std::fmt::Debug for HashStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashStore").finish_non_exhaustive()
    }
}

impl HashStore {
    /// Build a store over a persistence backend and an image decoder.
    #[must_use]
    pub fn new(records: Arc<dyn RecordStore>, decoder: Arc<dyn ImageDecoder>) -> Self {
        Self { records, decoder }
    }

    /// Fingerprint of the image at `path`, from cache when still valid.
    ///
    /// # Errors
    ///
    /// Returns [`HashStoreError::Decode`] if the file cannot be stat'ed or
    /// decoded, and [`HashStoreError::Store`] if the backend fails.
    pub fn get(&self, path: &Path) -> Result<Fingerprint, HashStoreError> {
        self.fetch(path).map(|fetched| fetched.fingerprint)
    }

    /// Like [`Self::get`], also reporting whether the cache was hit.
    ///
    /// # Errors
    ///
    /// See [`Self::get`].
    pub fn fetch(&self, path: &Path) -> Result<Fetched, HashStoreError> {
        let identity = resolve_identity(path)?;
        let mtime = modified_millis(&identity)?;

        if let Some(record) = self.records.lookup(&identity)? {
            if record.is_valid_for(mtime) {
                log::trace!("Cache hit: {}", identity.display());
                return Ok(Fetched {
                    fingerprint: record.fingerprint,
                    status: CacheStatus::Hit,
                });
            }
            log::debug!("Stale cache record: {}", identity.display());
        }

        let image = self.decoder.decode(&identity)?;
        let fingerprint = fingerprint_image(&image);
        self.records
            .upsert(&HashRecord::new(identity, fingerprint, mtime))?;

        Ok(Fetched {
            fingerprint,
            status: CacheStatus::Recomputed,
        })
    }

    /// Every stored `(identity, fingerprint)` pair, as stored.
    ///
    /// No liveness or staleness check is made; callers that care filter
    /// the result themselves.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the backend fails.
    pub fn get_all(&self) -> Result<Vec<(PathBuf, Fingerprint)>, CacheError> {
        Ok(self
            .records
            .scan_all()?
            .into_iter()
            .map(|record| (record.path, record.fingerprint))
            .collect())
    }

    /// Forget the record for `path`. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the backend fails.
    pub fn remove(&self, path: &Path) -> Result<bool, CacheError> {
        let identity = resolve_identity(path).unwrap_or_else(|_| path.to_path_buf());
        self.records.remove(&identity)
    }

    /// Forget every record. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the backend fails.
    pub fn clear(&self) -> Result<usize, CacheError> {
        let removed = self.records.clear()?;
        log::info!("Cleared {} cached fingerprints", removed);
        Ok(removed)
    }

    /// Delete records whose file no longer exists. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the backend fails.
    pub fn prune_missing(&self) -> Result<usize, CacheError> {
        let mut removed = 0;
        for record in self.records.scan_all()? {
            if !record.path.exists() && self.records.remove(&record.path)? {
                log::debug!("Pruned missing file: {}", record.path.display());
                removed += 1;
            }
        }
        log::info!("Pruned {} cache records for missing files", removed);
        Ok(removed)
    }

    /// Number of stored records.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the backend fails.
    pub fn len(&self) -> Result<usize, CacheError> {
        self.records.len()
    }

    /// Whether the store holds no records.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the backend fails.
    pub fn is_empty(&self) -> Result<bool, CacheError> {
        self.records.is_empty()
    }

    /// Fingerprint every path in parallel, filling the cache.
    ///
    /// Undecodable files, and files whose path cannot be stored, are logged,
    /// counted in [`WarmSummary::failed`] and skipped.
    ///
    /// # Errors
    ///
    /// Returns the first other [`CacheError`] raised by the backend; the
    /// remaining files are abandoned.
    pub fn warm(&self, paths: &[PathBuf], options: &WarmOptions) -> Result<WarmSummary, CacheError> {
        let total = paths.len();
        let processed = AtomicUsize::new(0);
        let stopped = AtomicBool::new(false);
        let store_error: Mutex<Option<CacheError>> = Mutex::new(None);

        let is_shutdown = || {
            options
                .shutdown_flag
                .as_ref()
                .is_some_and(|f| f.load(Ordering::SeqCst))
        };

        let results: Vec<(PathBuf, Result<Fetched, HashStoreError>)> = paths
            .par_iter()
            .filter_map(|path| {
                if stopped.load(Ordering::Relaxed) || is_shutdown() {
                    return None;
                }

                let outcome = match self.fetch(path) {
                    Ok(fetched) => Some((path.clone(), Ok(fetched))),
                    Err(HashStoreError::Store(e)) if !e.is_per_record() => {
                        stopped.store(true, Ordering::Relaxed);
                        if let Ok(mut slot) = store_error.lock() {
                            slot.get_or_insert(e);
                        }
                        None
                    }
                    Err(e) => {
                        log::warn!("Skipping {}: {}", path.display(), e);
                        Some((path.clone(), Err(e)))
                    }
                };

                let done = processed.fetch_add(1, Ordering::Relaxed) + 1;
                if let Some(ref callback) = options.progress_callback {
                    callback.on_progress(done, total);
                }
                outcome
            })
            .collect();

        if let Some(e) = store_error.into_inner().ok().flatten() {
            return Err(e);
        }

        let mut summary = WarmSummary {
            interrupted: processed.load(Ordering::Relaxed) < total,
            ..WarmSummary::default()
        };
        for (path, result) in results {
            match result {
                Ok(fetched) => {
                    match fetched.status {
                        CacheStatus::Hit => summary.hits += 1,
                        CacheStatus::Recomputed => summary.recomputed += 1,
                    }
                    summary.fingerprints.push((path, fetched.fingerprint));
                }
                Err(_) => summary.failed.push(path),
            }
        }
        summary.fingerprints.sort_by(|a, b| a.0.cmp(&b.0));
        summary.failed.sort();

        log::info!(
            "Fingerprinted {} files ({} cached, {} computed, {} failed)",
            summary.fingerprints.len(),
            summary.hits,
            summary.recomputed,
            summary.failed.len()
        );
        Ok(summary)
    }
}

/// Absolute form of `path`, used as the cache identity.
fn resolve_identity(path: &Path) -> Result<PathBuf, DecodeError> {
    std::path::absolute(path).map_err(|source| DecodeError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Modification time of `path` in milliseconds since the Unix epoch.
fn modified_millis(path: &Path) -> Result<i64, DecodeError> {
    let io_err = |source| DecodeError::Io {
        path: path.to_path_buf(),
        source,
    };
    let modified = std::fs::metadata(path).and_then(|m| m.modified()).map_err(io_err)?;
    Ok(system_time_to_millis(modified))
}

/// Convert a timestamp to signed epoch milliseconds, saturating at the `i64` range.
#[must_use]
pub fn system_time_to_millis(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => i64::try_from(after.as_millis()).unwrap_or(i64::MAX),
        Err(before) => i64::try_from(before.duration().as_millis()).map_or(i64::MIN, |ms| -ms),
    }
}
