//! Lazy enumeration of the normalized children of a parent pattern.
//!
//! Doubling the bin resolution splits every parent bin in two, so each child
//! bin is either `2*parent[i]` or `2*parent[i] + 1`. An N-bit counter indexes
//! the `2^N` raw combinations, bit `i` selecting the upper half in plane `i`.
//! The iterator walks the counter downwards, rejects combinations no straight
//! line can produce, and normalizes survivors by shifting and mirroring.
//!
//! The transform tag is part of the output: it is what the downstream matcher
//! applies when comparing a stored child against real hit data.

use crate::pattern::{Pattern, Transform};

/// Iterator over the suitable child patterns of a given parent.
///
/// Yields by reference to an internal buffer; callers must copy the child
/// before advancing. [`ChildIter::transform`] reports the tag of the most
/// recently yielded child.
#[derive(Debug, Clone)]
pub struct ChildIter {
    parent: Pattern,
    child: Pattern,
    /// Raw combinations not yet considered; the next counter value is
    /// `remaining - 1`.
    remaining: u32,
    transform: Transform,
}

impl ChildIter {
    /// Starts the enumeration for `parent`.
    pub fn new(parent: &Pattern) -> Self {
        let n = parent.nplanes();
        debug_assert!(n < 32, "plane count must fit the refinement counter");
        Self {
            parent: parent.clone(),
            child: parent.clone(),
            remaining: 1u32 << n,
            transform: Transform::Identity,
        }
    }

    /// Rewinds the enumeration to the first candidate.
    pub fn reset(&mut self) {
        self.remaining = 1u32 << self.parent.nplanes();
    }

    /// Transform tag of the most recently yielded child.
    #[inline]
    pub fn transform(&self) -> Transform {
        self.transform
    }

    /// Advances to the next suitable child, or `None` when exhausted.
    ///
    /// Emitted children satisfy `bin[0] == 0` and `min(bin) == 0`.
    pub fn next_child(&mut self) -> Option<&Pattern> {
        let n = self.parent.nplanes();
        while self.remaining > 0 {
            self.remaining -= 1;
            let k = self.remaining;

            let mut minbit = u16::MAX;
            let mut maxbit = 0u16;
            for i in 0..n {
                let bit = (self.parent.bin(i) << 1) + ((k >> i) & 1) as u16;
                self.child.set_bin(i, bit);
                if bit < minbit {
                    minbit = bit;
                }
                if bit > maxbit {
                    maxbit = bit;
                }
            }

            // An interior bin outside the envelope of the two outer planes
            // cannot lie on a straight line through all planes.
            let skew = i32::from(self.child.bin(n - 1)) - i32::from(self.child.bin(0));
            let span = maxbit - minbit;
            if i32::from(span) > skew.abs() {
                continue;
            }

            // The parent is normalized (min bin 0), so the raw minimum is 0 or 1.
            debug_assert!(minbit <= 1);
            if minbit == 1 {
                for i in 0..n {
                    self.child.set_bin(i, self.child.bin(i) - 1);
                }
                self.transform = Transform::Shifted;
            } else {
                self.transform = Transform::Identity;
            }

            if skew < 0 {
                // Descending combinations normalize through a mirror. A shift
                // requires every raw bin >= 1 while a descent from plane 0
                // requires a raw 0 below plane 0's bin, so the two never mix.
                debug_assert!(
                    self.transform == Transform::Identity,
                    "shift and mirror cannot co-occur"
                );
                for i in 0..n {
                    self.child.set_bin(i, span - self.child.bin(i));
                }
                self.transform = Transform::Mirrored;
            }

            debug_assert_eq!(self.child.bin(0), 0);
            return Some(&self.child);
        }
        None
    }
}
