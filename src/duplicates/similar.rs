//! Single-image similarity lookup.
//!
//! Unlike clustering, a lookup is a plain O(N) scan: it returns the images
//! directly within the threshold of the target and does not follow chains.
//! If A≈B and B≈C but A and C are far apart, looking up A returns only B.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::cache::{HashStore, HashStoreError};
use crate::scanner::DEFAULT_THRESHOLD;

/// One image close to the lookup target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimilarMatch {
    /// Path of the matching image
    pub path: PathBuf,
    /// Hamming distance to the target
    pub distance: u32,
}

/// Finds cached images similar to one target image.
#[derive(Debug, Clone, Copy)]
pub struct SimilarityLookup<'a> {
    store: &'a HashStore,
    threshold: u32,
}

impl<'a> SimilarityLookup<'a> {
    /// Create a lookup over `store` with the default threshold.
    #[must_use]
    pub fn new(store: &'a HashStore) -> Self {
        Self {
            store,
            threshold: DEFAULT_THRESHOLD,
        }
    }

    /// Set the similarity threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: u32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Images within the threshold of `target`, closest first (ties by path).
    ///
    /// The target itself is never returned, nor are cached entries whose file
    /// no longer exists. Stale entries are refreshed through the store; an
    /// entry that fails to decode is logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`HashStoreError`] if the target cannot be fingerprinted or
    /// the cache snapshot cannot be read.
    pub fn find(&self, target: &Path) -> Result<Vec<SimilarMatch>, HashStoreError> {
        let target_fp = self.store.get(target)?;
        let target_identity = std::path::absolute(target).unwrap_or_else(|_| target.to_path_buf());

        let mut matches = Vec::new();
        for (path, _) in self.store.get_all()? {
            if path == target_identity || !path.exists() {
                continue;
            }

            let fingerprint = match self.store.get(&path) {
                Ok(fp) => fp,
                Err(e) => {
                    log::warn!("Skipping {}: {}", path.display(), e);
                    continue;
                }
            };

            let distance = target_fp.distance(fingerprint);
            if distance <= self.threshold {
                matches.push(SimilarMatch { path, distance });
            }
        }

        matches.sort_by(|a, b| a.distance.cmp(&b.distance).then_with(|| a.path.cmp(&b.path)));
        log::debug!(
            "{} images within distance {} of {}",
            matches.len(),
            self.threshold,
            target.display()
        );
        Ok(matches)
    }
}
