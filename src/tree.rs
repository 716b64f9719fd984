//! Build parameters and the finished pattern tree snapshot.
//!
//! [`TreeParam`] is the generator's configuration: recursion depth, detector
//! width, plane positions, and the slope bound. [`PatternTree`] is the
//! immutable result handle: it owns the built graph, carries the normalized
//! parameters and statistics, and offers read-only traversal plus CBOR
//! persistence for handing the database to the reconstruction stage.

use crate::arena::{ChildLink, PatternArena, PatternId, PatternNode};
use crate::generator::Statistics;
use crate::pattern::Pattern;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;

/// Highest supported `maxdepth`. Bin indices are `u16` and a plane is
/// divided into `2^depth` bins, so depth 16 is the last one that fits.
pub const MAX_DEPTH: u32 = 16;

/// Error returned when tree parameters fail normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeError {
    /// Fewer than two plane positions given.
    NoPlanes,
    /// Plane positions are not strictly increasing at this index.
    NotMonotonic(usize),
    /// Detector width must be positive and finite.
    BadWidth(f64),
    /// Maximum slope must lie in (0, 1] in normalized units.
    BadSlope(f64),
    /// Requested depth exceeds [`MAX_DEPTH`].
    BadDepth(u32),
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeError::NoPlanes => write!(f, "at least two plane positions required"),
            TreeError::NotMonotonic(i) => {
                write!(f, "plane positions not strictly increasing at index {}", i)
            }
            TreeError::BadWidth(w) => write!(f, "detector width {} not positive", w),
            TreeError::BadSlope(s) => write!(f, "max slope {} outside (0, 1]", s),
            TreeError::BadDepth(d) => write!(f, "depth {} exceeds supported maximum {}", d, MAX_DEPTH),
        }
    }
}

impl std::error::Error for TreeError {}

/// Input parameters of a tree build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeParam {
    /// Depth of the finest refinement level (the tree has `maxdepth + 1` levels).
    pub maxdepth: u32,
    /// Transverse width of the detector, in physical units.
    pub width: f64,
    /// Maximum allowed track slope, in normalized units (0, 1].
    pub maxslope: f64,
    /// Longitudinal plane positions, strictly increasing.
    pub zpos: Vec<f64>,
}

impl TreeParam {
    /// Validates the parameters and rescales the plane positions so that
    /// `z[0] = 0` and `z[last] = 1`.
    ///
    /// The generator requires normalized coordinates; collaborators may pass
    /// physical z positions and let this do the scaling.
    pub fn normalized(&self) -> Result<TreeParam, TreeError> {
        if self.zpos.len() < 2 {
            return Err(TreeError::NoPlanes);
        }
        if self.maxdepth > MAX_DEPTH {
            return Err(TreeError::BadDepth(self.maxdepth));
        }
        if !self.width.is_finite() || self.width <= 0.0 {
            return Err(TreeError::BadWidth(self.width));
        }
        if !self.maxslope.is_finite() || self.maxslope <= 0.0 || self.maxslope > 1.0 {
            return Err(TreeError::BadSlope(self.maxslope));
        }
        for i in 1..self.zpos.len() {
            if !(self.zpos[i] > self.zpos[i - 1]) {
                return Err(TreeError::NotMonotonic(i));
            }
        }
        let z0 = self.zpos[0];
        let span = self.zpos[self.zpos.len() - 1] - z0;
        let zpos = self.zpos.iter().map(|&z| (z - z0) / span).collect();
        Ok(TreeParam {
            maxdepth: self.maxdepth,
            width: self.width,
            maxslope: self.maxslope,
            zpos,
        })
    }
}

/// Immutable snapshot of a generated pattern database.
///
/// Owns the node arena; the generator that built it has released all state.
/// Traversal starts at [`PatternTree::root`] and follows child links; the
/// transform tag on each link tells the matcher how to map the normalized
/// child onto the detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternTree {
    param: TreeParam,
    root: PatternId,
    arena: PatternArena,
    stats: Statistics,
}

impl PatternTree {
    pub(crate) fn new(
        param: TreeParam,
        root: PatternId,
        arena: PatternArena,
        stats: Statistics,
    ) -> Self {
        Self {
            param,
            root,
            arena,
            stats,
        }
    }

    /// The normalized build parameters.
    #[inline]
    pub fn parameters(&self) -> &TreeParam {
        &self.param
    }

    /// Build statistics collected when the tree was generated.
    #[inline]
    pub fn statistics(&self) -> &Statistics {
        &self.stats
    }

    /// Number of unique patterns in the tree.
    #[inline]
    pub fn n_patterns(&self) -> u32 {
        self.stats.n_patterns
    }

    /// Number of child links in the tree.
    #[inline]
    pub fn n_links(&self) -> u32 {
        self.stats.n_links
    }

    /// Handle of the all-zero root node.
    #[inline]
    pub fn root(&self) -> PatternId {
        self.root
    }

    /// The node behind a handle.
    #[inline]
    pub fn node(&self, id: PatternId) -> &PatternNode {
        &self.arena[id]
    }

    /// Bins of the node behind a handle.
    #[inline]
    pub fn pattern(&self, id: PatternId) -> &Pattern {
        &self.arena[id].pattern
    }

    /// Child links of the node behind a handle, in generation order.
    #[inline]
    pub fn children(&self, id: PatternId) -> &[ChildLink] {
        &self.arena[id].children
    }

    /// Iterates over every unique node in allocation order.
    pub fn nodes(&self) -> impl Iterator<Item = (PatternId, &PatternNode)> {
        self.arena.iter()
    }

    /// Prints the statistics report, or with option `'D'` dumps every unique
    /// pattern's bin vector in serialization order.
    pub fn print(&self, opt: &str, os: &mut impl Write) -> std::io::Result<()> {
        if opt.starts_with('D') {
            let mut order: Vec<(i32, PatternId)> = self
                .arena
                .iter()
                .map(|(id, node)| (node.ref_index, id))
                .collect();
            order.sort();
            for (_, id) in order {
                writeln!(os, "{}", self.arena[id].pattern)?;
            }
            return Ok(());
        }

        let zlist = self
            .param
            .zpos
            .iter()
            .map(|z| z.to_string())
            .collect::<Vec<_>>()
            .join(",");
        writeln!(
            os,
            "tree: nlevels = {}, nplanes = {}, zpos = {}",
            self.param.maxdepth + 1,
            self.param.zpos.len(),
            zlist
        )?;
        writeln!(
            os,
            "patterns = {}, links = {}, bytes = {}",
            self.stats.n_patterns, self.stats.n_links, self.stats.n_bytes
        )?;
        writeln!(
            os,
            "maxlinklen = {}, maxhash = {}, hashbytes = {}",
            self.stats.max_child_list_length, self.stats.max_hash_depth, self.stats.n_hash_bytes
        )?;
        writeln!(os, "time = {} s", self.stats.build_time)
    }

    /// Serializes the tree to CBOR bytes.
    pub fn to_cbor(&self) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
        let bytes = serde_cbor::to_vec(self)?;
        Ok(bytes)
    }

    /// Deserializes a tree from CBOR bytes.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self, Box<dyn std::error::Error>> {
        let tree: Self = serde_cbor::from_slice(bytes)?;
        Ok(tree)
    }

    /// Writes the tree to a binary file.
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), Box<dyn std::error::Error>> {
        let bytes = self.to_cbor()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Reads a tree back from a binary file.
    pub fn load_from_file(path: &std::path::Path) -> Result<Self, Box<dyn std::error::Error>> {
        let bytes = std::fs::read(path)?;
        Self::from_cbor(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(zpos: Vec<f64>) -> TreeParam {
        TreeParam {
            maxdepth: 3,
            width: 0.4,
            maxslope: 0.5,
            zpos,
        }
    }

    #[test]
    fn normalization_rescales_zpos() {
        let p = param(vec![1.0, 2.0, 5.0]).normalized().unwrap();
        assert_eq!(p.zpos, vec![0.0, 0.25, 1.0]);
        assert_eq!(p.maxdepth, 3);
    }

    #[test]
    fn normalization_rejects_bad_parameters() {
        assert_eq!(
            param(vec![0.0]).normalized().unwrap_err(),
            TreeError::NoPlanes
        );
        assert_eq!(
            param(vec![0.0, 0.5, 0.5]).normalized().unwrap_err(),
            TreeError::NotMonotonic(2)
        );
        assert_eq!(
            param(vec![0.0, 1.0, 0.5]).normalized().unwrap_err(),
            TreeError::NotMonotonic(2)
        );

        let mut p = param(vec![0.0, 0.5, 1.0]);
        p.maxslope = 0.0;
        assert_eq!(p.normalized().unwrap_err(), TreeError::BadSlope(0.0));
        p.maxslope = 1.5;
        assert_eq!(p.normalized().unwrap_err(), TreeError::BadSlope(1.5));

        let mut p = param(vec![0.0, 0.5, 1.0]);
        p.width = -1.0;
        assert_eq!(p.normalized().unwrap_err(), TreeError::BadWidth(-1.0));

        let mut p = param(vec![0.0, 0.5, 1.0]);
        p.maxdepth = MAX_DEPTH + 1;
        assert_eq!(p.normalized().unwrap_err(), TreeError::BadDepth(17));
    }

    #[test]
    fn normalization_accepts_already_normalized() {
        let p = param(vec![0.0, 0.5, 1.0]).normalized().unwrap();
        assert_eq!(p.zpos, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn error_messages() {
        assert_eq!(
            TreeError::NotMonotonic(2).to_string(),
            "plane positions not strictly increasing at index 2"
        );
        assert_eq!(TreeError::BadSlope(0.0).to_string(), "max slope 0 outside (0, 1]");
    }
}
