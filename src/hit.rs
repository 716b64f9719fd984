//! Hits, the hit-pair merge iterator, and hit-set similarity.
//!
//! Wire chambers read out two staggered wire planes per measurement
//! direction; road building consumes their hits as pairs. [`HitPairIter`]
//! co-iterates two ordered hit sequences under a bounded-distance
//! equivalence: unmatched hits come out singly, matched ones as pairs, and
//! when one hit in A matches several consecutive hits in B the iterator
//! scans B with A held fixed, then rewinds B so no hit is lost or reported
//! unpaired by mistake.
//!
//! [`HitSet`] carries the hits attached to a road candidate together with
//! its plane-occupancy bitmask, and offers the containment-up-to-planes
//! test used when merging roads.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A single wire hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hit {
    /// Index of the wire plane this hit belongs to.
    pub plane: u16,
    /// Wire number within the plane.
    pub wire: u32,
    /// Transverse position of the wire.
    pub pos: f64,
    /// Position resolution.
    pub resolution: f64,
}

impl Hit {
    /// Creates a hit.
    pub fn new(plane: u16, wire: u32, pos: f64, resolution: f64) -> Self {
        debug_assert!(plane < 32, "plane index must fit the occupancy bitmask");
        Self {
            plane,
            wire,
            pos,
            resolution,
        }
    }

    /// Tolerance comparison used by the pair iterator.
    ///
    /// `Less` and `Greater` mean the hits lie farther than `maxdist` apart;
    /// `Equal` means they match within `maxdist`.
    pub fn cmp_within(&self, other: &Hit, maxdist: f64) -> Ordering {
        if self.pos < other.pos - maxdist {
            Ordering::Less
        } else if self.pos > other.pos + maxdist {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    }
}

// Strict total order for set storage: by plane, then position, then wire.
impl Ord for Hit {
    fn cmp(&self, other: &Self) -> Ordering {
        self.plane
            .cmp(&other.plane)
            .then_with(|| self.pos.total_cmp(&other.pos))
            .then_with(|| self.wire.cmp(&other.wire))
            .then_with(|| self.resolution.total_cmp(&other.resolution))
    }
}

impl PartialOrd for Hit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Hit {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Hit {}

/// A pair of matched hits; one side is absent for unmatched hits.
pub type HitPair<'a> = (Option<&'a Hit>, Option<&'a Hit>);

/// Pointer identity, so equal-valued hits at different positions stay apart.
fn same_hit(x: Option<&Hit>, y: Option<&Hit>) -> bool {
    match (x, y) {
        (Some(a), Some(b)) => std::ptr::eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

/// Merge-walk over two ordered hit sequences.
///
/// Produces pairs `(a, b)` where at least one side is present; `(None,
/// None)` never comes out of the [`Iterator`] impl, it is the internal
/// end marker. Cloning deep-copies all three cursors, so a clone iterates
/// independently.
#[derive(Debug, Clone)]
pub struct HitPairIter<'a> {
    hits_a: &'a [Hit],
    hits_b: &'a [Hit],
    maxdist: f64,
    /// Next unread element of A.
    cursor_a: usize,
    /// Next unread element of B.
    cursor_b: usize,
    /// B cursor state at the start of the current scan.
    save_cursor: usize,
    /// The B hit at the start of the current scan.
    save_hit: Option<&'a Hit>,
    started: bool,
    scanning: bool,
    current: HitPair<'a>,
    next: HitPair<'a>,
}

impl<'a> HitPairIter<'a> {
    /// Creates an iterator over two sequences sorted by position.
    pub fn new(hits_a: &'a [Hit], hits_b: &'a [Hit], maxdist: f64) -> Self {
        Self {
            hits_a,
            hits_b,
            maxdist,
            cursor_a: 0,
            cursor_b: 0,
            save_cursor: 0,
            save_hit: None,
            started: false,
            scanning: false,
            current: (None, None),
            next: (None, None),
        }
    }

    /// Rewinds both cursors; the next advance re-primes the first pair.
    pub fn reset(&mut self) {
        self.cursor_a = 0;
        self.cursor_b = 0;
        self.save_cursor = 0;
        self.save_hit = None;
        self.started = false;
        self.scanning = false;
        self.current = (None, None);
        self.next = (None, None);
    }

    fn take_a(&mut self) -> Option<&'a Hit> {
        let hit = self.hits_a.get(self.cursor_a);
        if hit.is_some() {
            self.cursor_a += 1;
        }
        hit
    }

    fn take_b(&mut self) -> Option<&'a Hit> {
        let hit = self.hits_b.get(self.cursor_b);
        if hit.is_some() {
            self.cursor_b += 1;
        }
        hit
    }

    /// Returns the next pair along the planes. If a hit on either side is
    /// unpaired, only that side is set. `(None, None)` means exhaustion.
    pub fn advance(&mut self) -> HitPair<'a> {
        if !self.started {
            self.next = (self.take_a(), self.take_b());
            self.started = true;
        }

        self.current = self.next;
        match self.current {
            (Some(hit_a), Some(hit_b)) => match hit_a.cmp_within(hit_b, self.maxdist) {
                Ordering::Less => {
                    self.next.0 = self.take_a();
                    self.current.1 = None;
                }
                Ordering::Greater => {
                    self.next.1 = self.take_b();
                    self.current.0 = None;
                }
                Ordering::Equal => {
                    let next_b = self.take_b();
                    let scan_ends = match next_b {
                        None => true,
                        Some(nb) => hit_a.cmp_within(nb, self.maxdist) == Ordering::Less,
                    };
                    if scan_ends {
                        if self.scanning {
                            // End of a scan of B with hit_a fixed: return B
                            // to where the scan started and move A forward.
                            self.scanning = false;
                            self.cursor_b = self.save_cursor;
                            let mut hit_b = self.save_hit;
                            let new_a = self.take_a();
                            if let Some(a) = new_a {
                                // The Bs between the scan start and next_b
                                // were all paired with the previous A; walk
                                // past the ones that also precede the new A
                                // so they are not re-emitted as unpaired.
                                while !same_hit(hit_b, next_b)
                                    && hit_b.map_or(false, |b| {
                                        b.cmp_within(a, self.maxdist) == Ordering::Less
                                    })
                                {
                                    hit_b = self.take_b();
                                }
                            } else {
                                // No more A: only the rest of B remains.
                                hit_b = next_b;
                            }
                            self.next = (new_a, hit_b);
                        } else {
                            // Normal case: a one-to-one match.
                            self.next = (self.take_a(), next_b);
                        }
                    } else {
                        // More than one B matches this A: keep A fixed and
                        // walk B. Save the scan start, iterator and hit both.
                        if !self.scanning {
                            self.scanning = true;
                            self.save_cursor = self.cursor_b;
                            self.save_hit = self.current.1;
                        }
                        self.next.1 = next_b;
                    }
                }
            },
            (Some(_), None) => {
                self.next.0 = self.take_a();
            }
            (None, Some(_)) => {
                self.next.1 = self.take_b();
            }
            (None, None) => {}
        }

        self.current
    }
}

impl<'a> Iterator for HitPairIter<'a> {
    type Item = HitPair<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.advance() {
            (None, None) => None,
            pair => Some(pair),
        }
    }
}

/// An ordered set of hits with its precomputed plane-occupancy bitmask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitSet {
    hits: Vec<Hit>,
    plane_pattern: u32,
}

impl HitSet {
    /// Builds a set from hits, sorting and deduplicating them.
    pub fn new(mut hits: Vec<Hit>) -> Self {
        hits.sort();
        hits.dedup();
        let plane_pattern = Self::match_value(&hits);
        Self {
            hits,
            plane_pattern,
        }
    }

    /// Plane occupancy bitmask of a hit slice.
    pub fn match_value(hits: &[Hit]) -> u32 {
        hits.iter().fold(0u32, |pat, hit| pat | 1u32 << hit.plane)
    }

    /// The stored hits, ordered.
    #[inline]
    pub fn hits(&self) -> &[Hit] {
        &self.hits
    }

    /// Bit `p` is set iff some hit of this set lies in plane `p`.
    #[inline]
    pub fn plane_pattern(&self) -> u32 {
        self.plane_pattern
    }

    /// Like the standard includes() algorithm, but `tryset` may have extra
    /// hits in a plane as long as at least one hit of that plane is shared.
    ///
    /// Standard inclusion would demand `intersection == tryset`; this tests
    /// `planepattern(intersection) == planepattern(tryset)`.
    pub fn is_similar_to(&self, tryset: &HitSet) -> bool {
        debug_assert!(tryset.plane_pattern != 0);

        let mut intersection_pattern = 0u32;
        let mut i = 0;
        let mut j = 0;
        while i < self.hits.len() && j < tryset.hits.len() {
            match tryset.hits[j].cmp(&self.hits[i]) {
                Ordering::Less => j += 1,
                Ordering::Greater => i += 1,
                Ordering::Equal => {
                    intersection_pattern |= 1u32 << tryset.hits[j].plane;
                    i += 1;
                    j += 1;
                }
            }
        }
        tryset.plane_pattern == intersection_pattern
    }
}
