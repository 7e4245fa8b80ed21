//! Forest index over BSP trees with best-first search.

use std::collections::VecDeque;
use std::io::Write;

use serde::{Deserialize, Serialize};

use super::{Index, IndexBuilder, SearchResult, SearchStream};
use crate::bsp::{BspTree, BspTreeBuilder, CutPlaneFactory, DEFAULT_LEAFS};
use crate::collection::PriorityQueue;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::features::Features;
use crate::linalg::LinAlg;
use crate::persistence::{self, IndexKind};
use crate::scalar::Scalar;

/// Index over a forest of BSP trees sharing one corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BspTreeIndex<T> {
    features: Features<T>,
    trees: Vec<BspTree>,
}

impl<T: Scalar> BspTreeIndex<T> {
    pub fn trees(&self) -> &[BspTree] {
        &self.trees
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Position of one frontier node: tree plus node slot within it.
#[derive(Debug, Clone, Copy)]
struct TreeSlot {
    root: u32,
    node: u32,
}

/// Best-first traversal over the whole forest.
///
/// The queue priority of an unexpanded subtree is a monotone
/// non-decreasing lower bound on the distance slack the query must cross to
/// reach that subtree; taking `max` with the parent's priority tightens the
/// bound along every root-to-leaf path.
struct BspSearchStream<'a, T: Scalar> {
    index: &'a BspTreeIndex<T>,
    ctx: &'a Context,
    env: LinAlg<T>,
    query: &'a [T],
    queue: PriorityQueue<TreeSlot>,
    pending: VecDeque<SearchResult>,
}

impl<T: Scalar> Iterator for BspSearchStream<'_, T> {
    type Item = SearchResult;

    fn next(&mut self) -> Option<SearchResult> {
        loop {
            if self.ctx.is_cancelled() {
                return None;
            }
            if let Some(out) = self.pending.pop_front() {
                return Some(out);
            }

            let entry = self.queue.pop().ok()?;
            let index = self.index;
            let tree = &index.trees[entry.item.root as usize];
            let node = &tree.nodes[entry.item.node as usize];

            if node.is_leaf() {
                for i in node.begin..node.end {
                    let item = tree.indice[i as usize];
                    let distance = self
                        .env
                        .sq_l2(self.query, index.features.get(item as usize));
                    self.pending.push_back(SearchResult {
                        index: item,
                        distance,
                    });
                }
                continue;
            }

            // A malformed internal node ends the stream cleanly.
            let cut_plane = node.cut_plane.as_ref()?;
            let worst = entry.priority;
            let d = cut_plane.distance(self.query, &self.env) as f32;
            if node.right > 0 {
                self.queue.push(
                    TreeSlot {
                        root: entry.item.root,
                        node: node.right,
                    },
                    (-d).max(worst),
                );
            }
            if node.left > 0 {
                self.queue.push(
                    TreeSlot {
                        root: entry.item.root,
                        node: node.left,
                    },
                    d.max(worst),
                );
            }
        }
    }
}

impl<T: Scalar> Index<T> for BspTreeIndex<T> {
    fn search_channel<'a>(&'a self, ctx: &'a Context, query: &'a [T]) -> SearchStream<'a> {
        let mut queue = PriorityQueue::with_capacity(64);
        for root in 0..self.trees.len() {
            queue.push(
                TreeSlot {
                    root: root as u32,
                    node: 0,
                },
                f32::NEG_INFINITY,
            );
        }

        Box::new(BspSearchStream {
            index: self,
            ctx,
            env: ctx.linalg::<T>(),
            query,
            queue,
            pending: VecDeque::new(),
        })
    }

    fn save(&self, w: &mut dyn Write) -> Result<()> {
        persistence::save_index(self, IndexKind::BspTree, T::KIND, w)
    }
}

/// Builder for [`BspTreeIndex`]: cut-plane factory plus forest shape.
#[derive(Debug, Clone)]
pub struct BspTreeIndexBuilder<F> {
    dim: usize,
    factory: F,
    leafs: usize,
    trees: usize,
    procs: usize,
}

impl<F: CutPlaneFactory> BspTreeIndexBuilder<F> {
    pub fn new(dim: usize, factory: F) -> Self {
        Self {
            dim,
            factory,
            leafs: DEFAULT_LEAFS,
            trees: 1,
            procs: crate::context::default_procs(),
        }
    }

    pub fn with_leafs(mut self, leafs: usize) -> Self {
        self.leafs = leafs.max(1);
        self
    }

    pub fn with_trees(mut self, trees: usize) -> Self {
        self.trees = trees.max(1);
        self
    }

    pub fn with_procs(mut self, procs: usize) -> Self {
        self.procs = procs.max(1);
        self
    }
}

impl<T: Scalar, F: CutPlaneFactory> IndexBuilder<T> for BspTreeIndexBuilder<F> {
    type Output = BspTreeIndex<T>;

    fn build(&self, ctx: &Context, features: &[Vec<T>]) -> Result<BspTreeIndex<T>> {
        if features.is_empty() {
            return Err(Error::EmptyPool);
        }

        let features = Features::from_rows(self.dim, features)?;
        let env = ctx.linalg::<T>();
        let trees = BspTreeBuilder::new(self.factory.clone())
            .with_leafs(self.leafs)
            .build_forest(&features, &env, self.trees, self.procs)?;

        Ok(BspTreeIndex { features, trees })
    }
}
