//! Whole-corpus duplicate clustering.
//!
//! # Overview
//!
//! [`ClusterEngine`] partitions a snapshot of `(path, fingerprint)` pairs
//! into maximal groups of images connected by "distance ≤ threshold"
//! links. Grouping is transitive: if A≈B and B≈C then A, B and C share a
//! group even when A and C are far apart.
//!
//! Every pair is compared once, so a run costs O(N²) distance checks. The
//! outer index is split into batches that run on a rayon pool; each batch
//! compares its indices against every later index and merges matches into a
//! shared [`UnionFind`]. After each batch a `(processed, total)` update goes
//! to the progress callback.
//!
//! Cancellation is cooperative. The shutdown flag is polled before every
//! outer index and before every group is emitted; a cancelled run reports
//! [`ScanOutcome::Cancelled`] and emits nothing further.
//!
//! # Example
//!
//! ```
//! use photodupe::duplicates::{ClusterConfig, ClusterEngine};
//! use photodupe::scanner::Fingerprint;
//! use std::path::PathBuf;
//!
//! let entries = vec![
//!     (PathBuf::from("/a.png"), Fingerprint::from_bits(0b0000)),
//!     (PathBuf::from("/b.png"), Fingerprint::from_bits(0b0111)),
//!     (PathBuf::from("/c.png"), Fingerprint::from_bits(u64::MAX)),
//! ];
//!
//! let mut groups = Vec::new();
//! let outcome = ClusterEngine::new(ClusterConfig::default()).cluster(entries, |g| groups.push(g));
//!
//! assert_eq!(outcome.groups(), Some(1));
//! assert_eq!(groups[0].len(), 2);
//! ```

use std::ops::Range;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;

use rayon::prelude::*;

use super::groups::DuplicateGroup;
use super::union_find::UnionFind;
use crate::cache::{CacheError, HashStore};
use crate::progress::{ProgressCallback, PHASE_CLUSTERING};
use crate::scanner::{hamming, Fingerprint, DEFAULT_THRESHOLD};

/// Outer indices handled per batch, and so between progress updates.
pub const DEFAULT_PROGRESS_BATCH: usize = 100;

/// Configuration for a clustering run.
#[derive(Clone)]
pub struct ClusterConfig {
    /// Maximum Hamming distance for two images to be linked.
    pub threshold: u32,
    /// Worker threads. `0` uses rayon's global pool (one per core).
    pub workers: usize,
    /// Outer indices per batch.
    pub progress_batch: usize,
    /// Optional shutdown flag for graceful termination.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for ClusterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterConfig")
            .field("threshold", &self.threshold)
            .field("workers", &self.workers)
            .field("progress_batch", &self.progress_batch)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            workers: 0,
            progress_batch: DEFAULT_PROGRESS_BATCH,
            shutdown_flag: None,
            progress_callback: None,
        }
    }
}

impl ClusterConfig {
    /// Set the similarity threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: u32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the number of worker threads (`0` for one per core).
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the batch size between progress updates.
    #[must_use]
    pub fn with_progress_batch(mut self, batch: usize) -> Self {
        self.progress_batch = batch.max(1);
        self
    }

    /// Set the shutdown flag for graceful termination.
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

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }
}

/// How a clustering run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Every pair was compared and every group emitted.
    Completed {
        /// Number of groups emitted
        groups: usize,
    },
    /// The shutdown flag was observed; groups may be missing.
    Cancelled {
        /// Outer indices fully compared before stopping
        processed: usize,
        /// Total number of entries
        total: usize,
    },
}

impl ScanOutcome {
    /// Number of groups, for a completed run.
    #[must_use]
    pub fn groups(&self) -> Option<usize> {
        match self {
            Self::Completed { groups } => Some(*groups),
            Self::Cancelled { .. } => None,
        }
    }

    /// Whether the run was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Pairwise duplicate clustering over a fingerprint snapshot.
#[derive(Debug, Clone, Default)]
pub struct ClusterEngine {
    config: ClusterConfig,
}

impl ClusterEngine {
    /// Create an engine with the given configuration.
    #[must_use]
    pub fn new(config: ClusterConfig) -> Self {
        Self { config }
    }

    /// The engine's configuration.
    #[must_use]
    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Cluster `entries`, handing each finished group to `on_group`.
    ///
    /// Groups are emitted one at a time on the calling thread after all
    /// comparisons finish. Membership is deterministic; emission order is
    /// by representative path.
    pub fn cluster<F>(&self, entries: Vec<(PathBuf, Fingerprint)>, mut on_group: F) -> ScanOutcome
    where
        F: FnMut(DuplicateGroup),
    {
        let total = entries.len();
        let (paths, fingerprints): (Vec<PathBuf>, Vec<Fingerprint>) = entries.into_iter().unzip();

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_start(PHASE_CLUSTERING, total);
        }
        log::info!(
            "Clustering {} fingerprints (threshold {})",
            total,
            self.config.threshold
        );

        let forest = UnionFind::new(total);
        let processed = AtomicUsize::new(0);
        let batches = batch_ranges(total, self.config.progress_batch);

        let compare = || {
            batches.into_par_iter().for_each(|range| {
                self.compare_batch(range, &fingerprints, &forest, &processed);
            });
        };
        match self.build_pool() {
            Some(pool) => pool.install(compare),
            None => compare(),
        }

        let processed = processed.load(Ordering::SeqCst);
        let outcome = if self.config.is_shutdown_requested() {
            log::info!("Clustering interrupted after {}/{} entries", processed, total);
            ScanOutcome::Cancelled { processed, total }
        } else {
            self.emit_groups(&forest, &paths, processed, &mut on_group)
        };

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_end(PHASE_CLUSTERING);
        }
        outcome
    }

    /// Cluster every fingerprint currently in `store`.
    ///
    /// The snapshot is taken as stored, without checking file liveness.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the snapshot cannot be read; no comparison
    /// runs in that case.
    pub fn scan_store<F>(&self, store: &HashStore, on_group: F) -> Result<ScanOutcome, CacheError>
    where
        F: FnMut(DuplicateGroup),
    {
        let entries = store.get_all()?;
        Ok(self.cluster(entries, on_group))
    }

    /// Cluster `entries` and return all groups at once, largest first.
    #[must_use]
    pub fn cluster_all(&self, entries: Vec<(PathBuf, Fingerprint)>) -> (Vec<DuplicateGroup>, ScanOutcome) {
        let mut groups = Vec::new();
        let outcome = self.cluster(entries, |group| groups.push(group));
        super::groups::sort_groups(&mut groups);
        (groups, outcome)
    }

    /// Run [`Self::cluster`] on a background thread, streaming events.
    #[must_use]
    pub fn spawn(self, entries: Vec<(PathBuf, Fingerprint)>) -> ScanHandle {
        self.spawn_with(move || Ok(entries))
    }

    /// Run [`Self::scan_store`] on a background thread, streaming events.
    ///
    /// A store failure ends the stream with [`ScanStatus::Error`].
    #[must_use]
    pub fn spawn_store(self, store: HashStore) -> ScanHandle {
        self.spawn_with(move || store.get_all())
    }

    fn spawn_with<S>(mut self, snapshot: S) -> ScanHandle
    where
        S: FnOnce() -> Result<Vec<(PathBuf, Fingerprint)>, CacheError> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let cancel = self
            .config
            .shutdown_flag
            .get_or_insert_with(|| Arc::new(AtomicBool::new(false)))
            .clone();
        self.config.progress_callback = Some(Arc::new(ChannelProgress {
            tx: tx.clone(),
            inner: self.config.progress_callback.take(),
        }));

        let worker_tx = tx.clone();
        let spawned = std::thread::Builder::new()
            .name("photodupe-cluster".to_string())
            .spawn(move || {
                let status = match snapshot() {
                    Ok(entries) => {
                        let outcome = self.cluster(entries, |group| {
                            let _ = worker_tx.send(ScanEvent::Group(group));
                        });
                        ScanStatus::from(outcome)
                    }
                    Err(e) => {
                        log::error!("Cannot read fingerprint snapshot: {}", e);
                        ScanStatus::Error(e.to_string())
                    }
                };
                let _ = worker_tx.send(ScanEvent::Finished(status));
            });

        let thread = match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                let _ = tx.send(ScanEvent::Finished(ScanStatus::Error(format!(
                    "Failed to start clustering thread: {}",
                    e
                ))));
                None
            }
        };

        ScanHandle {
            events: rx,
            cancel,
            thread,
        }
    }

    fn compare_batch(
        &self,
        range: Range<usize>,
        fingerprints: &[Fingerprint],
        forest: &UnionFind,
        processed: &AtomicUsize,
    ) {
        let threshold = self.config.threshold;
        for i in range {
            if self.config.is_shutdown_requested() {
                return;
            }
            let fp = fingerprints[i];
            for (offset, other) in fingerprints[i + 1..].iter().enumerate() {
                if hamming(fp, *other) <= threshold {
                    forest.union(i, i + 1 + offset);
                }
            }
            processed.fetch_add(1, Ordering::SeqCst);
        }

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_progress(processed.load(Ordering::SeqCst), fingerprints.len());
        }
    }

    fn emit_groups<F>(
        &self,
        forest: &UnionFind,
        paths: &[PathBuf],
        processed: usize,
        on_group: &mut F,
    ) -> ScanOutcome
    where
        F: FnMut(DuplicateGroup),
    {
        let mut groups: Vec<DuplicateGroup> = forest
            .components(2)
            .into_iter()
            .map(|members| DuplicateGroup::new(members.into_iter().map(|i| paths[i].clone()).collect()))
            .collect();
        groups.sort_by(|a, b| a.representative().cmp(&b.representative()));

        let mut emitted = 0;
        for group in groups {
            if self.config.is_shutdown_requested() {
                log::info!("Group emission interrupted after {} groups", emitted);
                return ScanOutcome::Cancelled {
                    processed,
                    total: paths.len(),
                };
            }
            log::debug!(
                "Duplicate group of {} led by {}",
                group.len(),
                group.representative().map(|p| p.display().to_string()).unwrap_or_default()
            );
            on_group(group);
            emitted += 1;
        }

        log::info!("Found {} duplicate groups", emitted);
        ScanOutcome::Completed { groups: emitted }
    }

    fn build_pool(&self) -> Option<rayon::ThreadPool> {
        if self.config.workers == 0 {
            return None;
        }
        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers)
            .thread_name(|i| format!("photodupe-compare-{}", i))
            .build()
        {
            Ok(pool) => Some(pool),
            Err(e) => {
                log::warn!(
                    "Failed to create clustering pool ({}), using global pool with {} threads",
                    e,
                    rayon::current_num_threads()
                );
                None
            }
        }
    }
}

/// Split `0..total` into consecutive ranges of at most `batch` indices.
fn batch_ranges(total: usize, batch: usize) -> Vec<Range<usize>> {
    let batch = batch.max(1);
    (0..total)
        .step_by(batch)
        .map(|start| start..(start + batch).min(total))
        .collect()
}

/// Terminal status of a background scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanStatus {
    /// The scan finished and emitted this many groups.
    Completed {
        /// Number of groups emitted
        groups: usize,
    },
    /// The scan was cancelled.
    Cancelled,
    /// The scan could not run.
    Error(String),
}

impl From<ScanOutcome> for ScanStatus {
    fn from(outcome: ScanOutcome) -> Self {
        match outcome {
            ScanOutcome::Completed { groups } => Self::Completed { groups },
            ScanOutcome::Cancelled { .. } => Self::Cancelled,
        }
    }
}

/// One message from a background scan. [`ScanEvent::Finished`] is always last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// A batch of comparisons completed.
    Progress {
        /// Entries fully compared so far
        processed: usize,
        /// Total number of entries
        total: usize,
    },
    /// A duplicate group is ready.
    Group(DuplicateGroup),
    /// The scan ended.
    Finished(ScanStatus),
}

/// Handle to a clustering run on a background thread.
#[derive(Debug)]
pub struct ScanHandle {
    events: Receiver<ScanEvent>,
    cancel: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ScanHandle {
    /// Ask the scan to stop. It finishes its current index, emits no more
    /// groups and reports [`ScanStatus::Cancelled`].
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// The event stream.
    #[must_use]
    pub fn events(&self) -> &Receiver<ScanEvent> {
        &self.events
    }

    /// Drain every event and wait for the thread, returning the groups and
    /// the terminal status.
    #[must_use]
    pub fn wait(mut self) -> (Vec<DuplicateGroup>, ScanStatus) {
        let mut groups = Vec::new();
        let mut status = ScanStatus::Error("Clustering thread ended unexpectedly".to_string());
        for event in self.events.iter() {
            match event {
                ScanEvent::Group(group) => groups.push(group),
                ScanEvent::Finished(s) => {
                    status = s;
                    break;
                }
                ScanEvent::Progress { .. } => {}
            }
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                status = ScanStatus::Error("Clustering thread panicked".to_string());
            }
        }
        (groups, status)
    }
}

/// Forwards progress to the event channel and to any wrapped callback.
struct ChannelProgress {
    tx: Sender<ScanEvent>,
    inner: Option<Arc<dyn ProgressCallback>>,
}

impl ProgressCallback for ChannelProgress {
    fn on_phase_start(&self, phase: &str, total: usize) {
        if let Some(ref inner) = self.inner {
            inner.on_phase_start(phase, total);
        }
    }

    fn on_progress(&self, processed: usize, total: usize) {
        let _ = self.tx.send(ScanEvent::Progress { processed, total });
        if let Some(ref inner) = self.inner {
            inner.on_progress(processed, total);
        }
    }

    fn on_phase_end(&self, phase: &str) {
        if let Some(ref inner) = self.inner {
            inner.on_phase_end(phase);
        }
    }
}
