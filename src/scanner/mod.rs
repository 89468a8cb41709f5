//! Scanner module for image discovery, decoding and fingerprinting.
//!
//! This module provides functionality for:
//! - Parallel directory walking using jwalk
//! - Decoding files into pixels through a pluggable [`ImageDecoder`]
//! - Computing 64-bit perceptual [`Fingerprint`]s
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal and image discovery
//! - [`decoder`]: The image decoding seam
//! - [`perceptual`]: The fingerprint algorithm and Hamming distance

pub mod decoder;
pub mod perceptual;
pub mod walker;

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

// Re-export main types
pub use decoder::{DecodeError, ImageDecoder, StandardDecoder};
pub use perceptual::{fingerprint_image, hamming, Fingerprint, DEFAULT_THRESHOLD};
pub use walker::Walker;

/// File extensions treated as images when no explicit list is configured.
pub const DEFAULT_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp", "tif", "tiff"];

/// Configuration for directory walking.
#[derive(Debug, Clone)]
pub struct WalkerConfig {
    /// Follow symbolic links during traversal.
    /// Warning: May cause infinite loops with symlink cycles.
    pub follow_symlinks: bool,

    /// Include hidden files and directories (names starting with `.`).
    pub include_hidden: bool,

    /// Lowercase file extensions (without the dot) to treat as images.
    pub extensions: Vec<String>,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            follow_symlinks: false,
            include_hidden: false,
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

impl WalkerConfig {
    /// Whether `path` carries one of the configured extensions (case-insensitive).
    #[must_use]
    pub fn matches_extension(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|s| s.to_str()) else {
            return false;
        };
        let ext = ext.to_lowercase();
        self.extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext))
    }
}

/// Errors that can occur during directory scanning.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The specified path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Collect every image below `root`, logging and skipping walk errors.
///
/// When `shutdown_flag` is set mid-walk, the images found so far are returned.
///
/// # Errors
///
/// Returns [`ScanError`] if `root` does not exist or is not a directory.
pub fn discover_images(
    root: &Path,
    config: &WalkerConfig,
    shutdown_flag: Option<Arc<AtomicBool>>,
) -> Result<Vec<PathBuf>, ScanError> {
    if !root.exists() {
        return Err(ScanError::NotFound(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(ScanError::NotADirectory(root.to_path_buf()));
    }

    let mut walker = Walker::new(root, config.clone());
    if let Some(flag) = shutdown_flag {
        walker = walker.with_shutdown_flag(flag);
    }
    let images: Vec<PathBuf> = walker
        .walk()
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                log::warn!("Skipping: {}", e);
                None
            }
        })
        .collect();

    log::debug!("Discovered {} images under {}", images.len(), root.display());
    Ok(images)
}
