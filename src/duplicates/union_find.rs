//! Disjoint-set forest shared between clustering workers.
//!
//! Elements are indices `0..len`. Parents live in atomics so that [`find`]
//! needs no lock: every parent pointer always leads to an ancestor in the
//! same set, and path compression only replaces a pointer with one further
//! up that same chain, so concurrent readers and compressors can never
//! observe a wrong root for a set that is not being merged at that moment.
//!
//! [`union`] is serialized by a single mutex. Roots are recomputed under the
//! lock, so two workers merging overlapping sets cannot lose an edge.
//!
//! [`find`]: UnionFind::find
//! [`union`]: UnionFind::union

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Concurrent union-find over `0..len`.
#[derive(Debug)]
pub struct UnionFind {
    parent: Vec<AtomicUsize>,
    merge_lock: Mutex<()>,
}

impl UnionFind {
    /// Create `len` singleton sets.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            parent: (0..len).map(AtomicUsize::new).collect(),
            merge_lock: Mutex::new(()),
        }
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parent.len()
    }

    /// Whether there are no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Root of the set containing `x`, compressing the path on the way.
    ///
    /// # Panics
    ///
    /// Panics if `x >= len`.
    pub fn find(&self, x: usize) -> usize {
        let mut root = x;
        loop {
            let parent = self.parent[root].load(Ordering::Acquire);
            if parent == root {
                break;
            }
            root = parent;
        }

        let mut node = x;
        while node != root {
            let next = self.parent[node].load(Ordering::Acquire);
            if next == node {
                break;
            }
            // Only ever points `node` further up its own chain.
            let _ = self.parent[node].compare_exchange(
                next,
                root,
                Ordering::Release,
                Ordering::Relaxed,
            );
            node = next;
        }
        root
    }

    /// Merge the sets containing `a` and `b`: the root of `a` is attached
    /// under the root of `b`. Returns `false` if they were already joined.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of range.
    pub fn union(&self, a: usize, b: usize) -> bool {
        if self.find(a) == self.find(b) {
            return false;
        }

        // A poisoned lock only means another worker panicked mid-scan;
        // the forest itself is still consistent.
        let _guard = self
            .merge_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a == root_b {
            return false;
        }
        self.parent[root_a].store(root_b, Ordering::Release);
        true
    }

    /// Whether `a` and `b` are in the same set.
    pub fn connected(&self, a: usize, b: usize) -> bool {
        self.find(a) == self.find(b)
    }

    /// Sets with at least `min_size` members, each as a list of indices in
    /// ascending order.
    #[must_use]
    pub fn components(&self, min_size: usize) -> Vec<Vec<usize>> {
        let mut by_root: std::collections::HashMap<usize, Vec<usize>> =
            std::collections::HashMap::new();
        for i in 0..self.len() {
            by_root.entry(self.find(i)).or_default().push(i);
        }
        by_root
            .into_values()
            .filter(|members| members.len() >= min_size)
            .collect()
    }
}
