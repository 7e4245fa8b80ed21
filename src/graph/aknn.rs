//! Approximate k-NN graph construction.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::debug;

use super::nndescent::Nndescent;
use super::{Graph, GraphBuilder, GraphNode};
use crate::context::default_procs;
use crate::error::{Error, Result};

const DEFAULT_K: usize = 15;
const DEFAULT_RHO: f64 = 0.7;
const DEFAULT_MAX_ITER: usize = 4096;

/// Builds an approximate k-NN graph: random initialization followed by
/// NN-Descent rounds until the graph stops changing.
#[derive(Debug, Clone, Copy)]
pub struct AknnGraphBuilder {
    k: usize,
    rho: f64,
    max_iter: usize,
    max_changes: u64,
    procs: usize,
}

impl Default for AknnGraphBuilder {
    fn default() -> Self {
        Self {
            k: DEFAULT_K,
            rho: DEFAULT_RHO,
            max_iter: DEFAULT_MAX_ITER,
            max_changes: 0,
            procs: default_procs(),
        }
    }
}

impl AknnGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Target neighbors per vertex.
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    /// Per-round sample rate in `(0, 1]`.
    pub fn with_rho(mut self, rho: f64) -> Self {
        self.rho = rho;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Stop once a round changes at most this many vertices. Zero demands a
    /// full fixed point.
    pub fn with_max_changes(mut self, max_changes: u64) -> Self {
        self.max_changes = max_changes;
        self
    }

    pub fn with_procs(mut self, procs: usize) -> Self {
        self.procs = procs.max(1);
        self
    }
}

impl GraphBuilder for AknnGraphBuilder {
    fn build<D>(&self, n: usize, dist: D) -> Result<Graph>
    where
        D: Fn(u32, u32) -> f32 + Send + Sync,
    {
        if n == 0 {
            return Err(Error::EmptyPool);
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.procs)
            .build()
            .map_err(|e| Error::BuildFailed(e.to_string()))?;

        let k = self.k.min(n.saturating_sub(1));
        let init = randomized_kn_graph(n, k, &pool);
        let mut nndescent = Nndescent::new(&init, k, self.rho, dist);

        for iter in 0..self.max_iter {
            let changes = nndescent.update(&pool);
            debug!(iter, changes, "nndescent round");
            if changes <= self.max_changes {
                break;
            }
        }

        Ok(nndescent.create())
    }
}

/// Initial graph: `k` distinct random neighbors per vertex, self excluded.
fn randomized_kn_graph(n: usize, k: usize, pool: &rayon::ThreadPool) -> Graph {
    let mut nodes = vec![GraphNode::default(); n];
    pool.install(|| {
        nodes.par_iter_mut().enumerate().for_each(|(i, node)| {
            let mut rng = StdRng::from_entropy();
            let mut ignores = HashSet::with_capacity(k + 1);
            ignores.insert(i as u32);
            while ignores.len() <= k {
                let idx = rng.gen_range(0..n as u32);
                if !ignores.insert(idx) {
                    continue;
                }
                node.neighbors.push(idx);
            }
        });
    });
    Graph { nodes }
}
