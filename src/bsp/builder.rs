//! Recursive tree construction and parallel forest builds.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use tracing::debug;

use super::cut_plane::CutPlaneFactory;
use super::{BspNode, BspTree};
use crate::collection::partition;
use crate::error::{Error, Result};
use crate::features::Features;
use crate::linalg::LinAlg;
use crate::scalar::Scalar;

pub const DEFAULT_LEAFS: usize = 16;

/// Builds one BSP tree, or a whole forest, over a corpus.
#[derive(Debug, Clone)]
pub struct BspTreeBuilder<F> {
    factory: F,
    leafs: usize,
}

impl<F: CutPlaneFactory> BspTreeBuilder<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            leafs: DEFAULT_LEAFS,
        }
    }

    /// Maximum number of items per leaf.
    pub fn with_leafs(mut self, leafs: usize) -> Self {
        self.leafs = leafs.max(1);
        self
    }

    /// Builds a single tree with its own RNG.
    pub fn build_tree<T: Scalar>(
        &self,
        features: &Features<T>,
        env: &LinAlg<T>,
    ) -> Result<BspTree> {
        let mut rng = StdRng::from_entropy();
        let mut indice: Vec<u32> = (0..features.len() as u32).collect();
        indice.shuffle(&mut rng);

        let mut nodes = Vec::new();
        self.build_subtree(features, &mut indice, 0, env, &mut rng, &mut nodes)?;
        Ok(BspTree { indice, nodes })
    }

    fn build_subtree<T: Scalar>(
        &self,
        features: &Features<T>,
        indice: &mut [u32],
        offset: usize,
        env: &LinAlg<T>,
        rng: &mut StdRng,
        nodes: &mut Vec<BspNode>,
    ) -> Result<u32> {
        let count = indice.len();
        if count == 0 {
            return Ok(0);
        }

        let cur = nodes.len() as u32;
        nodes.push(BspNode {
            cut_plane: None,
            begin: offset as u32,
            end: (offset + count) as u32,
            left: 0,
            right: 0,
        });

        if count <= self.leafs {
            return Ok(cur);
        }

        let cut_plane = self.factory.build(features, indice, env, rng)?;
        let mut mid = partition(indice, |&i| cut_plane.evaluate(features.get(i as usize), env));
        // A one-sided split would recurse forever; fall back to an even cut.
        if mid == 0 || mid == count {
            mid = count / 2;
        }
        nodes[cur as usize].cut_plane = Some(cut_plane);

        let (left_slice, right_slice) = indice.split_at_mut(mid);
        let left = self.build_subtree(features, left_slice, offset, env, rng, nodes)?;
        nodes[cur as usize].left = left;
        let right = self.build_subtree(features, right_slice, offset + mid, env, rng, nodes)?;
        nodes[cur as usize].right = right;

        Ok(cur)
    }

    /// Builds `trees` independent trees on a pool of `procs` workers. Fails
    /// with the first tree error observed.
    pub fn build_forest<T: Scalar>(
        &self,
        features: &Features<T>,
        env: &LinAlg<T>,
        trees: usize,
        procs: usize,
    ) -> Result<Vec<BspTree>> {
        if features.is_empty() {
            return Err(Error::EmptyPool);
        }

        debug!(trees, procs, items = features.len(), "building bsp forest");
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(procs)
            .build()
            .map_err(|e| Error::BuildFailed(e.to_string()))?;
        pool.install(|| {
            (0..trees)
                .into_par_iter()
                .map(|_| self.build_tree(features, env))
                .collect::<Result<Vec<_>>>()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bsp::KdCutPlaneFactory;
    use crate::linalg::LinAlgConfig;
    use rand::Rng;

    fn random_features(n: usize, dim: usize) -> Features<f32> {
        let mut rng = StdRng::seed_from_u64(11);
        let rows: Vec<Vec<f32>> = (0..n)
            .map(|_| (0..dim).map(|_| rng.gen_range(-1.0..1.0)).collect())
            .collect();
        Features::from_rows(dim, &rows).unwrap()
    }

    fn check_structure(tree: &BspTree, n: usize) {
        // Every corpus index appears exactly once in the permutation.
        let mut seen = vec![false; n];
        for &i in &tree.indice {
            assert!(!seen[i as usize]);
            seen[i as usize] = true;
        }
        assert!(seen.iter().all(|&s| s));

        let mut leaf_total = 0u32;
        for (i, node) in tree.nodes.iter().enumerate() {
            assert!(node.begin <= node.end);
            if node.is_leaf() {
                assert!(node.cut_plane.is_none());
                leaf_total += node.end - node.begin;
            } else {
                assert!(node.cut_plane.is_some());
                assert!(node.left > 0 && node.right > 0);
                let left = &tree.nodes[node.left as usize];
                let right = &tree.nodes[node.right as usize];
                assert_eq!(left.begin, node.begin);
                assert_eq!(right.end, node.end);
                assert_eq!(left.end, right.begin);
                assert!(i < node.left as usize && i < node.right as usize);
            }
        }
        assert_eq!(leaf_total as usize, n);
    }

    #[test]
    fn tree_structure_is_sound() {
        let features = random_features(200, 8);
        let env = LinAlg::new(&LinAlgConfig::default());
        let builder = BspTreeBuilder::new(KdCutPlaneFactory::new()).with_leafs(4);

        let tree = builder.build_tree(&features, &env).unwrap();
        check_structure(&tree, 200);
    }

    #[test]
    fn forest_build_produces_requested_trees() {
        let features = random_features(64, 4);
        let env = LinAlg::new(&LinAlgConfig::default());
        let builder = BspTreeBuilder::new(KdCutPlaneFactory::new()).with_leafs(2);

        let forest = builder.build_forest(&features, &env, 5, 2).unwrap();
        assert_eq!(forest.len(), 5);
        for tree in &forest {
            check_structure(tree, 64);
        }
    }

    #[test]
    fn forest_build_rejects_empty_pool() {
        let features: Features<f32> = Features::from_rows(4, &[]).unwrap();
        let env = LinAlg::new(&LinAlgConfig::default());
        let builder = BspTreeBuilder::new(KdCutPlaneFactory::new());

        assert!(matches!(
            builder.build_forest(&features, &env, 1, 1),
            Err(Error::EmptyPool)
        ));
    }

    #[test]
    fn tiny_leaf_size_forces_singleton_leaves() {
        let features = random_features(32, 4);
        let env = LinAlg::new(&LinAlgConfig::default());
        let builder = BspTreeBuilder::new(KdCutPlaneFactory::new()).with_leafs(1);

        let tree = builder.build_tree(&features, &env).unwrap();
        for node in tree.nodes.iter().filter(|n| n.is_leaf()) {
            assert_eq!(node.end - node.begin, 1);
        }
    }
}
