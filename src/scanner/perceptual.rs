//! Perceptual image fingerprinting for similarity detection.
//!
//! # Overview
//!
//! A [`Fingerprint`] is a 64-bit average-luminance hash:
//!
//! 1. Convert the decoded image to 8-bit grayscale
//! 2. Resample it to an 8×8 grid with a triangle (bilinear/area) filter
//! 3. Compute the integer mean of the 64 samples
//! 4. Emit one bit per sample in row-major order, `1` when the sample is
//!    at or above the mean; the top-left sample lands in the most
//!    significant bit
//!
//! The result survives resizing, format conversion and mild recompression.
//! It is *not* rotation or crop invariant; a rotated copy is a different
//! image as far as this hash is concerned.
//!
//! Two fingerprints are compared with [`hamming`], the number of differing
//! bits. Images at or below [`DEFAULT_THRESHOLD`] are considered duplicates.
//!
//! # Example
//!
//! ```
//! use image::{DynamicImage, GrayImage, Luma};
//! use photodupe::scanner::perceptual::{fingerprint_image, hamming};
//!
//! let img = DynamicImage::ImageLuma8(GrayImage::from_fn(64, 64, |x, _| Luma([(x * 4) as u8])));
//! let small = img.resize_exact(32, 32, image::imageops::FilterType::Triangle);
//!
//! let a = fingerprint_image(&img);
//! let b = fingerprint_image(&small);
//! assert!(hamming(a, b) <= 2);
//! ```

use std::fmt;
use std::str::FromStr;

use image::imageops::{self, FilterType};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Side length of the sampling grid.
const GRID: u32 = 8;

/// Default Hamming distance at or below which two images are duplicates.
pub const DEFAULT_THRESHOLD: u32 = 5;

/// A 64-bit perceptual fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(u64);

impl Fingerprint {
    /// Number of bits in a fingerprint.
    pub const BITS: u32 = 64;

    /// Wrap a raw 64-bit value.
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// The raw 64-bit value.
    #[must_use]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Hamming distance to another fingerprint.
    #[must_use]
    pub fn distance(self, other: Fingerprint) -> u32 {
        hamming(self, other)
    }

    /// Whether `other` is within `threshold` bits of this fingerprint.
    #[must_use]
    pub fn is_similar(self, other: Fingerprint, threshold: u32) -> bool {
        hamming(self, other) <= threshold
    }

    /// Render as a 64-character string of `0`/`1`, most significant bit first.
    #[must_use]
    pub fn to_bit_string(self) -> String {
        format!("{:064b}", self.0)
    }

    /// Parse the 64-character `0`/`1` form produced by [`Self::to_bit_string`].
    ///
    /// # Errors
    ///
    /// Returns [`ParseFingerprintError`] if the input is not exactly 64
    /// binary digits.
    pub fn from_bit_string(s: &str) -> Result<Self, ParseFingerprintError> {
        if s.len() != Self::BITS as usize || !s.bytes().all(|b| b == b'0' || b == b'1') {
            return Err(ParseFingerprintError(s.to_string()));
        }
        u64::from_str_radix(s, 2)
            .map(Self)
            .map_err(|_| ParseFingerprintError(s.to_string()))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for Fingerprint {
    type Err = ParseFingerprintError;

    /// Parses the 16-digit hexadecimal form produced by `Display`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 16 {
            return Err(ParseFingerprintError(s.to_string()));
        }
        u64::from_str_radix(s, 16)
            .map(Self)
            .map_err(|_| ParseFingerprintError(s.to_string()))
    }
}

/// Error returned when a string is not a valid fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid fingerprint: {0:?}")]
pub struct ParseFingerprintError(String);

/// Number of differing bits between two fingerprints, in `0..=64`.
#[inline]
#[must_use]
pub fn hamming(a: Fingerprint, b: Fingerprint) -> u32 {
    (a.0 ^ b.0).count_ones()
}

/// Compute the fingerprint of a decoded image.
///
/// Pure and stateless; safe to call from any number of threads.
#[must_use]
pub fn fingerprint_image(img: &DynamicImage) -> Fingerprint {
    let gray = img.to_luma8();
    let small = imageops::resize(&gray, GRID, GRID, FilterType::Triangle);

    let samples: Vec<u64> = small.pixels().map(|p| u64::from(p.0[0])).collect();
    let mean = samples.iter().sum::<u64>() / samples.len() as u64;

    let bits = samples
        .iter()
        .fold(0u64, |acc, &sample| (acc << 1) | u64::from(sample >= mean));

    Fingerprint(bits)
}
