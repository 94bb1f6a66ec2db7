//! Two-stage duplicate detection: exact URL matching, then perceptual
//! average-hash comparison under a Hamming-distance threshold. State is
//! scoped to one curation run and never persisted.

use image::imageops::{self, FilterType};
use image::RgbImage;
use rustc_hash::FxHashSet;
use std::path::Path;

/// Side length of the reduced grayscale grid; 16 gives a 256-bit fingerprint.
pub const HASH_SIZE: u32 = 16;

/// Maximum Hamming distance (in bits) at which two fingerprints are
/// considered near-duplicates.
pub const DEFAULT_SIMILARITY_THRESHOLD: u32 = 5;

/// A 256-bit perceptual fingerprint.
pub type Fingerprint = [u64; 4];

/// Detects exact and near-duplicate images within a single curation run.
///
/// Comparison against previously accepted images is exhaustive, O(k) per
/// check; exact and simple at curation scale (tens to low hundreds).
pub struct DuplicateDetector {
    threshold: u32,
    seen_urls: FxHashSet<String>,
    seen_hashes: Vec<Fingerprint>,
}

impl DuplicateDetector {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            seen_urls: FxHashSet::default(),
            seen_hashes: Vec::new(),
        }
    }

    /// Checks the image at `path` (downloaded from `url`) against everything
    /// accepted so far. Non-duplicates are recorded for future comparisons.
    ///
    /// An image whose hash cannot be computed is let through unrecorded; the
    /// face check adjudicates unreadable candidates.
    pub fn is_duplicate(&mut self, path: &Path, url: &str) -> bool {
        if self.seen_urls.contains(url) {
            return true;
        }

        let fingerprint = match average_hash_file(path) {
            Some(fingerprint) => fingerprint,
            None => return false,
        };

        if self
            .seen_hashes
            .iter()
            .any(|seen| hamming_distance(seen, &fingerprint) <= self.threshold)
        {
            return true;
        }

        self.seen_urls.insert(url.to_owned());
        self.seen_hashes.push(fingerprint);
        false
    }

    /// Number of distinct images recorded so far this run.
    pub fn seen_count(&self) -> usize {
        self.seen_hashes.len()
    }
}

impl Default for DuplicateDetector {
    fn default() -> Self {
        Self::new(DEFAULT_SIMILARITY_THRESHOLD)
    }
}

/// Computes the average hash: grayscale, reduce to a 16x16 grid, set a bit
/// for every cell at or above the grid mean.
pub fn average_hash(image: &RgbImage) -> Fingerprint {
    let grayscale = imageops::grayscale(image);
    let reduced = imageops::resize(&grayscale, HASH_SIZE, HASH_SIZE, FilterType::Lanczos3);

    let cells = (HASH_SIZE * HASH_SIZE) as usize;
    let mean = reduced
        .pixels()
        .map(|pixel| f64::from(pixel.0[0]))
        .sum::<f64>()
        / cells as f64;

    let mut fingerprint: Fingerprint = [0; 4];
    for (index, pixel) in reduced.pixels().enumerate() {
        if f64::from(pixel.0[0]) >= mean {
            fingerprint[index / 64] |= 1 << (index % 64);
        }
    }
    fingerprint
}

fn average_hash_file(path: &Path) -> Option<Fingerprint> {
    image::open(path)
        .ok()
        .map(|image| average_hash(&image.to_rgb8()))
}

/// Number of differing bits between two fingerprints.
pub fn hamming_distance(left: &Fingerprint, right: &Fingerprint) -> u32 {
    left.iter()
        .zip(right)
        .map(|(a, b)| (a ^ b).count_ones())
        .sum()
}
