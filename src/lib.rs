//! Treesearch: a template-pattern database generator for wire-chamber track
//! reconstruction.
//!
//! This crate builds the pattern database used by tree-search tracking:
//! - Enumeration of every bin-occupancy pattern consistent with a straight
//!   line through a stack of parallel detection planes, at successively
//!   doubled bin resolutions.
//! - A shared tree (in truth a DAG) in which geometrically equivalent
//!   patterns are stored once, found again through a hash index, and
//!   re-extended when a shallower discovery demands a deeper subtree.
//! - The hit-pair merge iterator and hit-set similarity test consumed by
//!   road building downstream.
//!
//! The recursion doubles the bin resolution per level, so the tree encodes
//! every track template from coarse to fine without storing each pattern
//! individually; child lists carry a transform tag (identity, shift,
//! mirror) that maps the stored normalized pattern onto the detector.
//!
//! # References
//!
//! - Dell'Orso & Ristori, "VLSI structures for track finding",
//!   Nucl. Instrum. Meth. A287 (1990)
//! - Knuth, "The Art of Computer Programming", Vol. 3: Sorting and
//!   Searching, §6.4 (1998) – chained hashing
//!
//! # Example
//!
//! ```
//! use treesearch::prelude::*;
//!
//! let param = TreeParam {
//!     maxdepth: 4,
//!     width: 0.4,
//!     maxslope: 0.5,
//!     zpos: vec![0.0, 0.5, 1.0],
//! };
//! let mut generator = PatternGenerator::new();
//! let tree = generator.generate(&param).unwrap();
//! assert!(tree.n_patterns() > 0);
//! for link in tree.children(tree.root()) {
//!     let child = tree.pattern(link.target);
//!     assert_eq!(child.bin(0), 0);
//! }
//! ```

pub mod arena;
pub mod children;
pub mod generator;
pub mod geometry;
pub mod hit;
pub mod index;
pub mod pattern;
pub mod tree;

pub use arena::{ChildLink, PatternArena, PatternId, PatternNode};
pub use children::ChildIter;
pub use generator::{PatternGenerator, Statistics};
pub use hit::{Hit, HitPair, HitPairIter, HitSet};
pub use index::HashIndex;
pub use pattern::{Pattern, Transform};
pub use tree::{PatternTree, TreeError, TreeParam, MAX_DEPTH};

/// Prelude for convenient usage.
pub mod prelude {
    pub use crate::arena::{ChildLink, PatternArena, PatternId, PatternNode};
    pub use crate::children::ChildIter;
    pub use crate::generator::{PatternGenerator, Statistics};
    pub use crate::geometry::{line_consistent, slope_within};
    pub use crate::hit::{Hit, HitPair, HitPairIter, HitSet};
    pub use crate::index::HashIndex;
    pub use crate::pattern::{Pattern, Transform};
    pub use crate::tree::{PatternTree, TreeError, TreeParam, MAX_DEPTH};
}

#[cfg(test)]
mod tests {
    use super::prelude::*;

    fn build(maxdepth: u32, zpos: Vec<f64>, maxslope: f64) -> PatternTree {
        let param = TreeParam {
            maxdepth,
            width: 0.4,
            maxslope,
            zpos,
        };
        PatternGenerator::new().generate(&param).unwrap()
    }

    /// Minimal reference depth of every node, from the link structure.
    ///
    /// A link from `p` propagates `depth(p) + 1` to its target whenever the
    /// recursion would still have descended there.
    fn reference_depths(tree: &PatternTree) -> Vec<u32> {
        let nlevels = tree.parameters().maxdepth + 1;
        let mut depth = vec![u32::MAX; tree.nodes().count()];
        depth[tree.root().as_u32() as usize] = 0;
        loop {
            let mut changed = false;
            for (id, node) in tree.nodes() {
                let d = depth[id.as_u32() as usize];
                if d == u32::MAX || d + 1 >= nlevels {
                    continue;
                }
                for link in &node.children {
                    let t = link.target.as_u32() as usize;
                    if depth[t] > d + 1 {
                        depth[t] = d + 1;
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }
        depth
    }

    fn mirror_of(pat: &Pattern) -> Pattern {
        let span = *pat.bins().iter().max().unwrap();
        Pattern::from_bins(pat.bins().iter().map(|&b| span - b).collect())
    }

    #[test]
    fn stored_patterns_are_normalized() {
        let tree = build(4, vec![0.0, 0.25, 0.5, 0.75, 1.0], 0.6);
        for (_, node) in tree.nodes() {
            let bins = node.pattern.bins();
            assert_eq!(bins[0], 0);
            assert_eq!(*bins.iter().min().unwrap(), 0);
        }
    }

    #[test]
    fn stored_patterns_pass_the_predicates() {
        let tree = build(4, vec![0.0, 0.25, 0.5, 0.75, 1.0], 0.6);
        let maxdepth = tree.parameters().maxdepth;
        let maxslope = tree.parameters().maxslope;
        for (_, node) in tree.nodes() {
            // Every node passed the slope bound at its creation depth, which
            // implies the weakest bound, the one at the deepest level.
            assert!(slope_within(node.pattern.width(), maxdepth, maxslope));
            // Line feasibility does not depend on depth at all.
            assert!(line_consistent(&node.pattern, &tree.parameters().zpos));
        }
    }

    #[test]
    fn min_depth_matches_link_structure() {
        // Shared-node re-extension: a node first discovered deep must end up
        // with the minimal depth over all paths, not the first one.
        for (maxslope, zpos) in [
            (0.6, vec![0.0, 0.25, 0.5, 0.75, 1.0]),
            (1.0, vec![0.0, 0.5, 1.0]),
        ] {
            let tree = build(4, zpos, maxslope);
            let depths = reference_depths(&tree);
            for (id, node) in tree.nodes() {
                assert_eq!(
                    node.min_depth,
                    depths[id.as_u32() as usize],
                    "node {} has wrong min_depth",
                    node.pattern
                );
            }
        }
    }

    #[test]
    fn subtrees_are_complete_at_the_minimal_depth() {
        // Every candidate child that survives the predicates at a node's
        // minimal use depth must be linked; a truncated subtree here means
        // the re-extension pass was skipped.
        let tree = build(4, vec![0.0, 0.25, 0.5, 0.75, 1.0], 0.6);
        let nlevels = tree.parameters().maxdepth + 1;
        let maxslope = tree.parameters().maxslope;
        for (id, node) in tree.nodes() {
            let child_depth = node.min_depth + 1;
            if child_depth >= nlevels {
                continue;
            }
            let mut it = ChildIter::new(&node.pattern);
            loop {
                let candidate = match it.next_child() {
                    Some(c) => c.clone(),
                    None => break,
                };
                let transform = it.transform();
                if !slope_within(candidate.width(), child_depth, maxslope)
                    || !line_consistent(&candidate, &tree.parameters().zpos)
                {
                    continue;
                }
                let linked = tree.children(id).iter().any(|l| {
                    l.transform == transform && *tree.pattern(l.target) == candidate
                });
                assert!(
                    linked,
                    "candidate {} (tag {}) missing under {}",
                    candidate, transform, node.pattern
                );
            }
        }
    }

    #[test]
    fn mirrored_links_only_from_the_root() {
        let tree = build(3, vec![0.0, 0.25, 0.5, 0.75, 1.0], 0.6);
        let root = tree.root();
        for (id, node) in tree.nodes() {
            for link in &node.children {
                if link.transform == Transform::Mirrored {
                    assert_eq!(id, root);
                }
            }
        }
        // One mirrored link per non-symmetric depth-1 child.
        let children = tree.children(root);
        let non_symmetric = children
            .iter()
            .filter(|l| {
                l.transform == Transform::Identity
                    && mirror_of(tree.pattern(l.target)) != *tree.pattern(l.target)
            })
            .count();
        let mirrored = children
            .iter()
            .filter(|l| l.transform == Transform::Mirrored)
            .count();
        assert!(mirrored > 0);
        assert_eq!(mirrored, non_symmetric);
    }

    #[test]
    fn identical_parameters_build_identical_graphs() {
        let param = TreeParam {
            maxdepth: 4,
            width: 0.4,
            maxslope: 0.6,
            zpos: vec![0.0, 0.25, 0.5, 0.75, 1.0],
        };
        let a = PatternGenerator::new().generate(&param).unwrap();
        let b = PatternGenerator::new().generate(&param).unwrap();

        let node_bins = |t: &PatternTree| {
            let mut v: Vec<Vec<u16>> = t.nodes().map(|(_, n)| n.pattern.bins().to_vec()).collect();
            v.sort();
            v
        };
        let link_multiset = |t: &PatternTree| {
            let mut v: Vec<(Vec<u16>, Vec<u16>, u8)> = t
                .nodes()
                .flat_map(|(_, n)| {
                    n.children.iter().map(|l| {
                        (
                            n.pattern.bins().to_vec(),
                            t.pattern(l.target).bins().to_vec(),
                            l.transform.as_u8(),
                        )
                    })
                })
                .collect();
            v.sort();
            v
        };
        assert_eq!(node_bins(&a), node_bins(&b));
        assert_eq!(link_multiset(&a), link_multiset(&b));
    }

    #[test]
    fn print_reports_and_dumps() {
        let tree = build(1, vec![0.0, 0.5, 1.0], 1.0);

        let mut out = Vec::new();
        tree.print("", &mut out).unwrap();
        let report = String::from_utf8(out).unwrap();
        assert!(report.contains("tree: nlevels = 2, nplanes = 3, zpos = 0,0.5,1"));
        assert!(report.contains("patterns = 3, links = 6"));
        assert!(report.contains("time = "));

        let mut out = Vec::new();
        tree.print("D", &mut out).unwrap();
        let dump = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines.contains(&"0 0 0"));
        assert!(lines.contains(&"0 0 1"));
        assert!(lines.contains(&"0 1 1"));
    }

    #[test]
    fn tree_survives_cbor_round_trip() {
        let tree = build(3, vec![0.0, 0.5, 1.0], 0.6);
        let bytes = tree.to_cbor().unwrap();
        let loaded = PatternTree::from_cbor(&bytes).unwrap();
        assert_eq!(tree, loaded);
        assert_eq!(loaded.n_patterns(), tree.n_patterns());
        assert_eq!(loaded.children(loaded.root()), tree.children(tree.root()));
    }

    #[test]
    fn deeper_trees_only_grow() {
        let mut last = 0;
        for maxdepth in 1..=5 {
            let tree = build(maxdepth, vec![0.0, 0.5, 1.0], 0.6);
            assert!(tree.n_patterns() >= last);
            last = tree.n_patterns();
        }
        assert!(last > 3);
    }
}
