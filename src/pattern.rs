//! Bin-occupancy patterns over a stack of detection planes.
//!
//! A pattern records one transverse bin per plane. Patterns stored in the
//! database are *normalized*: plane 0 sits in bin 0 and the smallest bin is 0,
//! so every family of patterns related by a shift or a mirror is represented
//! by a single instance. The operation that recovers the physical pattern
//! from the normalized one travels on the link, as a [`Transform`] tag.
//!
//! # Citations
//! - Dell'Orso & Ristori, "VLSI structures for track finding",
//!   Nucl. Instrum. Meth. A287 (1990) – hierarchical template matching
//! - Knuth, "The Art of Computer Programming", Vol. 3, §6.4 (1998) – hashing

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Domain separation constant for pattern fingerprints (version 1).
const DOMAIN_PATTERN_V1: &[u8] = b"TSDB:PATTERN:v1";

/// Operation that recovers a raw bin combination from its normalized form.
///
/// Encoded on each child link. Mirror first, then shift, when undoing.
/// A simultaneously shifted and mirrored pattern cannot be produced by the
/// child iterator (a shift requires every raw bin to be at least 1, a mirror
/// requires the raw bins to descend from plane 0, and the two conditions are
/// incompatible for a normalized parent), so there are exactly three values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Transform {
    /// The child bins are the raw bins.
    Identity,
    /// The raw bins are the child bins plus one in every plane.
    Shifted,
    /// The raw bins are the child bins mirrored about the pattern span.
    /// Occurs only on links whose source is the root node.
    Mirrored,
}

impl Transform {
    /// Numeric tag as stored by the reference format (0, 1, 2).
    #[inline]
    pub const fn as_u8(self) -> u8 {
        match self {
            Transform::Identity => 0,
            Transform::Shifted => 1,
            Transform::Mirrored => 2,
        }
    }

    /// Whether applying this transform flips the pattern orientation.
    #[inline]
    pub const fn is_mirrored(self) -> bool {
        matches!(self, Transform::Mirrored)
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// An ordered tuple of bin indices, one per detection plane.
///
/// Bins are `u16`: at recursion depth `d` each plane is divided into `2^d`
/// bins, and the generator caps the depth so indices fit.
///
/// # Invariants (normalized form, as stored in the tree)
/// - `bins[0] == 0`
/// - `min(bins) == 0`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pattern {
    bins: Vec<u16>,
}

impl Pattern {
    /// Creates the all-zero pattern of the given plane count (the tree root).
    pub fn zeroed(nplanes: usize) -> Self {
        debug_assert!(nplanes >= 2, "a pattern needs at least two planes");
        Self {
            bins: vec![0; nplanes],
        }
    }

    /// Creates a pattern from explicit bins.
    pub fn from_bins(bins: Vec<u16>) -> Self {
        debug_assert!(bins.len() >= 2, "a pattern needs at least two planes");
        Self { bins }
    }

    /// Number of planes.
    #[inline]
    pub fn nplanes(&self) -> usize {
        self.bins.len()
    }

    /// Bin index of the pattern in plane `i`.
    #[inline]
    pub fn bin(&self, i: usize) -> u16 {
        self.bins[i]
    }

    /// Writes the bin index for plane `i`.
    #[inline]
    pub(crate) fn set_bin(&mut self, i: usize, bin: u16) {
        self.bins[i] = bin;
    }

    /// All bins, in plane order.
    #[inline]
    pub fn bins(&self) -> &[u16] {
        &self.bins
    }

    /// Signed width of the pattern.
    ///
    /// The magnitude is `max(bins) - min(bins) + 1`, the number of bins the
    /// pattern spans. The sign is the pattern's orientation: negative iff
    /// the bin in the last plane lies below the bin in the first plane,
    /// which marks raw combinations that normalize through a mirror.
    pub fn width(&self) -> i32 {
        let mut lo = self.bins[0];
        let mut hi = self.bins[0];
        for &b in &self.bins[1..] {
            if b < lo {
                lo = b;
            }
            if b > hi {
                hi = b;
            }
        }
        let magnitude = i32::from(hi - lo) + 1;
        if self.bins[self.bins.len() - 1] < self.bins[0] {
            -magnitude
        } else {
            magnitude
        }
    }

    /// Stable fingerprint over all bins, used to route into a hash bucket.
    ///
    /// SHA-256 with domain separation and length prefix, truncated to the
    /// first eight bytes. Only dispersion matters here; equality does the
    /// final check on lookup.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = Sha256::new();
        hasher.update(DOMAIN_PATTERN_V1);
        hasher.update((self.bins.len() as u64).to_le_bytes());
        for &b in &self.bins {
            hasher.update(b.to_le_bytes());
        }
        let digest = hasher.finalize();
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        u64::from_le_bytes(head)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.bins.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", b)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_sign_convention() {
        assert_eq!(Pattern::from_bins(vec![0, 0, 0]).width(), 1);
        assert_eq!(Pattern::from_bins(vec![0, 1, 1]).width(), 2);
        assert_eq!(Pattern::from_bins(vec![0, 1, 2]).width(), 3);
        // Descending raw combinations carry a negative width.
        assert_eq!(Pattern::from_bins(vec![1, 0, 0]).width(), -2);
        assert_eq!(Pattern::from_bins(vec![2, 1, 0]).width(), -3);
    }

    #[test]
    fn fingerprint_depends_on_every_bin() {
        let base = Pattern::from_bins(vec![0, 1, 2, 3]);
        for i in 0..4 {
            let mut other = base.clone();
            other.set_bin(i, other.bin(i) + 1);
            assert_ne!(base.fingerprint(), other.fingerprint());
        }
    }

    #[test]
    fn fingerprint_stable_across_instances() {
        let a = Pattern::from_bins(vec![0, 2, 4]);
        let b = Pattern::from_bins(vec![0, 2, 4]);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a, b);
    }

    #[test]
    fn transform_tags() {
        assert_eq!(Transform::Identity.as_u8(), 0);
        assert_eq!(Transform::Shifted.as_u8(), 1);
        assert_eq!(Transform::Mirrored.as_u8(), 2);
        assert!(Transform::Mirrored.is_mirrored());
        assert!(!Transform::Shifted.is_mirrored());
    }
}
