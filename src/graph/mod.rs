//! Approximate k-NN neighborhood graphs.

pub mod aknn;
pub mod nndescent;

pub use aknn::AknnGraphBuilder;
pub use nndescent::Nndescent;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::Result;

/// Adjacency list of one vertex.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub neighbors: SmallVec<[u32; 16]>,
}

/// Neighborhood graph over corpus indices. Directed as built; undirected
/// after [`to_undirected`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<GraphNode>,
}

/// Strategy for constructing a k-NN graph from pairwise distances.
pub trait GraphBuilder: Clone + Send + Sync {
    fn build<D>(&self, n: usize, dist: D) -> Result<Graph>
    where
        D: Fn(u32, u32) -> f32 + Send + Sync;
}

/// Adds every reciprocal edge and de-duplicates the adjacency lists. The
/// result is symmetric: `j ∈ neighbors[i]` iff `i ∈ neighbors[j]`.
pub fn to_undirected(graph: Graph) -> Graph {
    let mut sets: Vec<HashSet<u32>> = vec![HashSet::new(); graph.nodes.len()];
    for (i, node) in graph.nodes.iter().enumerate() {
        for &j in &node.neighbors {
            sets[i].insert(j);
            sets[j as usize].insert(i as u32);
        }
    }

    Graph {
        nodes: sets
            .into_iter()
            .map(|set| {
                let mut neighbors: SmallVec<[u32; 16]> = set.into_iter().collect();
                neighbors.sort_unstable();
                GraphNode { neighbors }
            })
            .collect(),
    }
}
