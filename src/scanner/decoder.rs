//! Image decoding seam.
//!
//! Fingerprinting needs decoded pixels, but where those pixels come from is
//! the caller's business: the standard decoder reads common still-image
//! formats through the `image` crate, while an embedding application may
//! plug in a decoder that extracts video frames or handles RAW files.

use std::path::{Path, PathBuf};

use image::DynamicImage;
use thiserror::Error;

/// Errors that can occur while turning a file into pixels.
///
/// Always per-file and recoverable: a scan skips the file and moves on.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The file could not be opened, stat'ed or read.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The file was read but is not a decodable image.
    #[error("Failed to load image {path}: {source}")]
    Image {
        /// Path of the undecodable file
        path: PathBuf,
        /// The underlying decoder error
        #[source]
        source: image::ImageError,
    },
}

impl DecodeError {
    /// Path of the file that failed.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Io { path, .. } | Self::Image { path, .. } => path,
        }
    }
}

/// Maps a file to a decoded pixel grid.
pub trait ImageDecoder: Send + Sync {
    /// Decode the image stored at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] if the file is unreadable or unsupported.
    fn decode(&self, path: &Path) -> Result<DynamicImage, DecodeError>;
}

/// Decoder backed by [`image::open`].
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardDecoder;

impl ImageDecoder for StandardDecoder {
    fn decode(&self, path: &Path) -> Result<DynamicImage, DecodeError> {
        image::open(path).map_err(|e| match e {
            image::ImageError::IoError(source) => DecodeError::Io {
                path: path.to_path_buf(),
                source,
            },
            source => DecodeError::Image {
                path: path.to_path_buf(),
                source,
            },
        })
    }
}
