//! Recursive construction of the shared pattern tree.
//!
//! The driver seeds the all-zero root, then walks depth first: at each parent
//! it asks the child iterator for normalized candidates, deduplicates them
//! through the hash index, prunes new ones with the slope and straight-line
//! predicates, and links survivors into the parent's child list. Because the
//! tree is self-referential, a pattern generated deep in the recursion can
//! reappear as a candidate child higher up; the shallower discovery relaxes
//! nothing structurally, but the node's subtree must then be extended one
//! level deeper along the new path. Skipping that re-extension truncates the
//! tree silently.
//!
//! # Citations
//! - Dell'Orso & Ristori, "VLSI structures for track finding",
//!   Nucl. Instrum. Meth. A287 (1990) – recursive template refinement

use crate::arena::{ChildLink, PatternArena, PatternId};
use crate::children::ChildIter;
use crate::geometry::{line_consistent, slope_within};
use crate::index::HashIndex;
use crate::pattern::Pattern;
use crate::tree::{PatternTree, TreeParam, TreeError};
use serde::{Deserialize, Serialize};
use std::mem;
use std::time::Instant;

/// Counts and memory footprint of a finished build.
///
/// Collected in one linear scan over the hash index once the tree is
/// complete; averages and byte totals cannot be tallied incrementally.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    /// Unique patterns stored.
    pub n_patterns: u32,
    /// Child links over all patterns.
    pub n_links: u32,
    /// Approximate bytes held by patterns, bins, and links.
    pub n_bytes: u64,
    /// Longest child list of any pattern.
    pub max_child_list_length: u32,
    /// Deepest hash bucket collision chain.
    pub max_hash_depth: u32,
    /// Approximate bytes held by the hash index.
    pub n_hash_bytes: u64,
    /// Wall-clock build time in seconds.
    pub build_time: f64,
}

/// Generator for the pattern template database.
///
/// Reusable: each call to [`PatternGenerator::generate`] discards any prior
/// build state, runs synchronously to completion, and moves the finished
/// graph into an immutable [`PatternTree`] snapshot.
#[derive(Debug, Default)]
pub struct PatternGenerator {
    nlevels: u32,
    nplanes: usize,
    max_slope: f64,
    zpos: Vec<f64>,
    arena: PatternArena,
    index: HashIndex,
    stats: Statistics,
}

impl PatternGenerator {
    /// Creates an idle generator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Statistics of the most recent build.
    #[inline]
    pub fn statistics(&self) -> &Statistics {
        &self.stats
    }

    /// Releases all build state. The arena and the hash index are the sole
    /// owners of patterns and links, so this is the one teardown path.
    pub fn clear(&mut self) {
        self.index.clear();
        self.arena.clear();
        self.stats = Statistics::default();
    }

    /// Generates a pattern tree for the given parameters.
    ///
    /// Fails only if parameter normalization fails; a tree that stops short
    /// of `maxdepth` because every candidate was pruned is a normal outcome.
    pub fn generate(&mut self, param: &TreeParam) -> Result<PatternTree, TreeError> {
        let param = param.normalized()?;

        self.clear();
        self.nlevels = param.maxdepth + 1;
        self.zpos = param.zpos.clone();
        self.nplanes = self.zpos.len();
        self.max_slope = param.maxslope;
        self.index = HashIndex::with_levels(self.nlevels);

        let start = Instant::now();

        // The trivial all-zero root node at depth 0.
        let root = self.add_pattern(Pattern::zeroed(self.nplanes));
        self.make_child_nodes(root, 1);

        self.calc_statistics();
        self.stats.build_time = start.elapsed().as_secs_f64();

        // Number the nodes for serialization and hand the graph over.
        self.index.assign_ref_indices(&mut self.arena);
        let arena = mem::take(&mut self.arena);
        self.index.clear();

        Ok(PatternTree::new(param, root, arena, self.stats.clone()))
    }

    /// Stores a new unique pattern in the arena and registers it in the index.
    fn add_pattern(&mut self, pattern: Pattern) -> PatternId {
        let fingerprint = pattern.fingerprint();
        let id = self.arena.alloc(pattern);
        self.index.insert(id, fingerprint);
        id
    }

    /// Generates child nodes for the given parent pattern.
    fn make_child_nodes(&mut self, parent: PatternId, depth: u32) {
        // Requesting children at this depth means the parent is in use at
        // the level above.
        if depth > 0 {
            self.arena[parent].used_at_depth(depth - 1);
        }

        // Base case: no child nodes beyond the last level.
        if depth >= self.nlevels {
            return;
        }

        // Enumerate the direct children once, on first reach.
        if self.arena[parent].children.is_empty() {
            let parent_pattern = self.arena[parent].pattern.clone();
            let mut links = Vec::new();
            let mut it = ChildIter::new(&parent_pattern);
            loop {
                let child = match it.next_child() {
                    Some(c) => c.clone(),
                    None => break,
                };
                let transform = it.transform();

                if let Some(node) = self.index.find(&child, &self.arena) {
                    // A node first linked at a shallower or equal depth
                    // already passed the slope bound there, which implies
                    // the weaker bound at this depth. Otherwise the bound is
                    // tighter here and the slope test must be redone.
                    if depth >= self.arena[node].min_depth
                        || slope_within(self.arena[node].pattern.width(), depth, self.max_slope)
                    {
                        links.push(ChildLink { target: node, transform });
                    }
                } else if slope_within(child.width(), depth, self.max_slope)
                    && line_consistent(&child, &self.zpos)
                {
                    let node = self.add_pattern(child);
                    links.push(ChildLink { target: node, transform });
                }
            }
            self.arena[parent].children = links;
        }

        // Recurse down the tree. Go deeper if a child has no children yet
        // OR (important) its children were generated from a deeper location
        // and its subtree must now be extended along this shallower path.
        let links = self.arena[parent].children.clone();
        for link in links {
            let node = &self.arena[link.target];
            if node.children.is_empty() || node.min_depth > depth {
                self.make_child_nodes(link.target, depth + 1);
            }
        }
    }

    /// One linear scan over the hash index for counts and memory footprint.
    fn calc_statistics(&mut self) {
        let mut stats = Statistics::default();
        let arena = &self.arena;
        self.index.walk(|id| {
            stats.n_patterns += 1;
            let list_length = arena[id].children.len() as u32;
            stats.n_links += list_length;
            if list_length > stats.max_child_list_length {
                stats.max_child_list_length = list_length;
            }
        });
        stats.max_hash_depth = self.index.max_chain_depth();

        let n_patterns = u64::from(stats.n_patterns);
        let n_links = u64::from(stats.n_links);
        stats.n_bytes = n_patterns * mem::size_of::<crate::arena::PatternNode>() as u64
            + n_patterns * self.nplanes as u64 * mem::size_of::<u16>() as u64
            + n_links * mem::size_of::<ChildLink>() as u64;
        stats.n_hash_bytes = self.index.bucket_count() as u64
            * mem::size_of::<Vec<PatternId>>() as u64
            + n_patterns * mem::size_of::<PatternId>() as u64;

        self.stats = stats;
    }
}
