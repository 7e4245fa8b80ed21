//! Binary space-partitioning trees.
//!
//! Internal nodes carry a splitting hyperplane; leaves carry a contiguous
//! range into a shuffled index permutation. Nodes live in a flat array with
//! `u32` child references: node 0 is the root, and 0 doubles as the
//! "no child" sentinel because the root never appears as a child. The flat
//! layout keeps traversal cache-friendly and serialization trivial.
//!
//! Two plane families are provided (see [`cut_plane`]): randomized KD planes
//! in the style of FLANN's randomized KD forests, and two-center random
//! projection planes. Forests of either kind are built in parallel by
//! [`BspTreeBuilder`].

mod builder;
mod cut_plane;

pub use builder::{BspTreeBuilder, DEFAULT_LEAFS};
pub use cut_plane::{CutPlane, CutPlaneFactory, KdCutPlaneFactory, RpCutPlaneFactory};

use serde::{Deserialize, Serialize};

/// Node of a flat-layout BSP tree. `[begin, end)` indexes into the owning
/// tree's `indice` permutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BspNode {
    pub cut_plane: Option<CutPlane>,
    pub begin: u32,
    pub end: u32,
    pub left: u32,
    pub right: u32,
}

impl BspNode {
    /// Leaves have no children and carry no cut plane.
    pub fn is_leaf(&self) -> bool {
        self.left == 0 && self.right == 0
    }
}

/// One tree of a forest: a shuffled permutation of corpus indices plus the
/// node array, root first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BspTree {
    pub indice: Vec<u32>,
    pub nodes: Vec<BspNode>,
}
