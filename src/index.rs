//! Deduplicating hash index over the pattern arena.
//!
//! Open chaining: a fingerprint routes to a bucket, the bucket's collision
//! chain holds handles of the unique patterns stored there, and bin-by-bin
//! equality does the final check. The arena plus this index together own
//! every pattern in the build; child links are mere handles into that
//! ownership, so one walk over the chains visits every unique pattern
//! exactly once.

use crate::arena::{PatternArena, PatternId, PatternNode};
use crate::pattern::Pattern;

/// Open-chaining table mapping pattern fingerprints to unique instances.
#[derive(Debug, Clone, Default)]
pub struct HashIndex {
    buckets: Vec<Vec<PatternId>>,
}

impl HashIndex {
    /// Creates a table sized for a build of `nlevels` levels.
    ///
    /// `2^(nlevels-1) * 2^(nplanes-2)` is the upper limit for the number of
    /// patterns, so `2^(nlevels-1)` buckets keep the average collision depth
    /// around `2^(nplanes-2)`. Anything better would need a cleverer hash.
    pub fn with_levels(nlevels: u32) -> Self {
        debug_assert!(nlevels >= 1);
        Self {
            buckets: vec![Vec::new(); 1usize << (nlevels - 1)],
        }
    }

    /// Number of buckets.
    #[inline]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    #[inline]
    fn bucket_of(&self, fingerprint: u64) -> usize {
        (fingerprint % self.buckets.len() as u64) as usize
    }

    /// Registers `id` under `fingerprint`.
    ///
    /// The chain records insertion order; lookups see the most recent entry
    /// first. The caller guarantees `fingerprint` matches the pattern stored
    /// at `id` and that no equal pattern is already present.
    pub fn insert(&mut self, id: PatternId, fingerprint: u64) {
        debug_assert!(!self.buckets.is_empty(), "insert into unsized table");
        let bucket = self.bucket_of(fingerprint);
        self.buckets[bucket].push(id);
    }

    /// Looks up the unique instance equal to `pat`, if one is stored.
    pub fn find(&self, pat: &Pattern, arena: &PatternArena) -> Option<PatternId> {
        let bucket = self.bucket_of(pat.fingerprint());
        self.buckets[bucket]
            .iter()
            .rev()
            .copied()
            .find(|&id| arena[id].pattern == *pat)
    }

    /// Visits every stored pattern exactly once, most recent first per chain.
    pub fn walk(&self, mut op: impl FnMut(PatternId)) {
        for chain in &self.buckets {
            for &id in chain.iter().rev() {
                op(id);
            }
        }
    }

    /// Length of the longest collision chain.
    pub fn max_chain_depth(&self) -> u32 {
        self.buckets.iter().map(|c| c.len() as u32).max().unwrap_or(0)
    }

    /// Clears every node's serialization index back to unset.
    pub fn reset_ref_indices(&self, arena: &mut PatternArena) {
        self.walk(|id| arena[id].ref_index = PatternNode::REF_UNSET);
    }

    /// Numbers every stored pattern sequentially in walk order and returns
    /// the count. Serialization passes use these indices as stable node ids.
    pub fn assign_ref_indices(&self, arena: &mut PatternArena) -> u32 {
        let mut next = 0i32;
        self.walk(|id| {
            arena[id].ref_index = next;
            next += 1;
        });
        next as u32
    }

    /// Drops all chains. The arena is cleared separately by the owner.
    pub fn clear(&mut self) {
        self.buckets.clear();
    }
}
