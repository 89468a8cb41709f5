//! Duplicate detection module.
//!
//! This module provides functionality for:
//! - Whole-corpus clustering into transitive duplicate groups ([`cluster`])
//! - Single-target similarity lookup ([`similar`])
//! - The shared union-find forest used by clustering ([`union_find`])
//! - Duplicate group management ([`groups`])

pub mod cluster;
pub mod groups;
pub mod similar;
pub mod union_find;

pub use cluster::{
    ClusterConfig, ClusterEngine, ScanEvent, ScanHandle, ScanOutcome, ScanStatus,
    DEFAULT_PROGRESS_BATCH,
};
pub use groups::{sort_groups, DuplicateGroup};
pub use similar::{SimilarMatch, SimilarityLookup};
pub use union_find::UnionFind;
