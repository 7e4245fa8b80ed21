//! Graph index: greedy descent over an approximate k-NN graph.

use std::collections::HashSet;
use std::io::Write;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{EntryPointIndex, Index, IndexBuilder, SearchResult, SearchStream};
use crate::collection::{PriorityQueue, WithPriority};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::features::Features;
use crate::graph::{to_undirected, Graph, GraphBuilder};
use crate::linalg::LinAlg;
use crate::persistence::{self, IndexKind};
use crate::scalar::Scalar;

const DEFAULT_ENTRIES_NUM: usize = 10;

/// Index over a symmetrized k-NN graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphIndex<T> {
    features: Features<T>,
    graph: Graph,
}

impl<T: Scalar> GraphIndex<T> {
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Best-first descent from one entry vertex. Terminates when the popped
    /// priority exceeds the best distance seen so far; every inspected
    /// vertex is marked visited for this descent only.
    fn find_approx_nearest(
        &self,
        entry: u32,
        dist: &impl Fn(u32) -> f32,
    ) -> Option<WithPriority<u32>> {
        if self.features.len() as u32 <= entry {
            return None;
        }

        let mut best = WithPriority {
            item: entry,
            priority: dist(entry),
        };
        let mut visited: HashSet<u32> = HashSet::from([entry]);
        let mut queue = PriorityQueue::new();
        queue.push(best.item, best.priority);

        while let Ok(current) = queue.pop() {
            if best.priority < current.priority {
                break;
            }
            for &n in &self.graph.nodes[current.item as usize].neighbors {
                if !visited.insert(n) {
                    continue;
                }
                let d = dist(n);
                if d < best.priority {
                    best = WithPriority {
                        item: n,
                        priority: d,
                    };
                }
                queue.push(n, d);
            }
        }

        Some(best)
    }
}

/// Lazy expansion of the graph frontier: seeds from per-entry descents,
/// then pops, emits, and enqueues unvisited neighbors.
struct GraphSearchStream<'a, T: Scalar> {
    index: &'a GraphIndex<T>,
    ctx: &'a Context,
    env: LinAlg<T>,
    query: &'a [T],
    entries: Vec<u32>,
    queue: PriorityQueue<u32>,
    visited: HashSet<u32>,
    seeded: bool,
}

impl<T: Scalar> GraphSearchStream<'_, T> {
    fn seed(&mut self) {
        let index = self.index;
        let env = self.env;
        let query = self.query;
        let dist = move |i: u32| env.sq_l2(query, index.features.get(i as usize));

        for &entry in &self.entries {
            let Some(nearest) = index.find_approx_nearest(entry, &dist) else {
                continue;
            };
            if !self.visited.insert(nearest.item) {
                continue;
            }
            self.queue.push(nearest.item, nearest.priority);
        }
    }
}

impl<T: Scalar> Iterator for GraphSearchStream<'_, T> {
    type Item = SearchResult;

    fn next(&mut self) -> Option<SearchResult> {
        if self.ctx.is_cancelled() {
            return None;
        }
        if !self.seeded {
            self.seeded = true;
            self.seed();
        }

        let current = self.queue.pop().ok()?;
        let index = self.index;
        for &n in &index.graph.nodes[current.item as usize].neighbors {
            if !self.visited.insert(n) {
                continue;
            }
            let d = self.env.sq_l2(self.query, index.features.get(n as usize));
            self.queue.push(n, d);
        }

        Some(SearchResult {
            index: current.item,
            distance: current.priority,
        })
    }
}

impl<T: Scalar> Index<T> for GraphIndex<T> {
    fn search_channel<'a>(&'a self, ctx: &'a Context, query: &'a [T]) -> SearchStream<'a> {
        let mut rng = rand::thread_rng();
        let n = self.features.len() as u32;
        let entries = (0..DEFAULT_ENTRIES_NUM)
            .map(|_| rng.gen_range(0..n.max(1)))
            .collect();
        self.search_channel_with_entries(ctx, query, entries)
    }

    fn save(&self, w: &mut dyn Write) -> Result<()> {
        persistence::save_index(self, IndexKind::Graph, T::KIND, w)
    }
}

impl<T: Scalar> EntryPointIndex<T> for GraphIndex<T> {
    fn search_channel_with_entries<'a>(
        &'a self,
        ctx: &'a Context,
        query: &'a [T],
        entries: Vec<u32>,
    ) -> SearchStream<'a> {
        Box::new(GraphSearchStream {
            index: self,
            ctx,
            env: ctx.linalg::<T>(),
            query,
            entries,
            queue: PriorityQueue::new(),
            visited: HashSet::new(),
            seeded: false,
        })
    }
}

/// Builder for [`GraphIndex`], generic over the graph construction.
#[derive(Debug, Clone)]
pub struct GraphIndexBuilder<G> {
    dim: usize,
    graph_builder: G,
}

impl<G: GraphBuilder> GraphIndexBuilder<G> {
    pub fn new(dim: usize, graph_builder: G) -> Self {
        Self { dim, graph_builder }
    }
}

impl<T: Scalar, G: GraphBuilder> IndexBuilder<T> for GraphIndexBuilder<G> {
    type Output = GraphIndex<T>;

    fn build(&self, ctx: &Context, features: &[Vec<T>]) -> Result<GraphIndex<T>> {
        if features.is_empty() {
            return Err(Error::EmptyPool);
        }

        let features = Features::from_rows(self.dim, features)?;
        let env = ctx.linalg::<T>();
        let graph = {
            let features = &features;
            self.graph_builder.build(features.len(), move |i, j| {
                env.sq_l2(features.get(i as usize), features.get(j as usize))
            })?
        };
        let graph = to_undirected(graph);

        Ok(GraphIndex { features, graph })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::AknnGraphBuilder;
    use crate::index::search;

    fn line_rows(n: usize) -> Vec<Vec<f32>> {
        (0..n).map(|i| vec![i as f32, 0.0]).collect()
    }

    fn build_line_index(n: usize) -> GraphIndex<f32> {
        let ctx = Context::new();
        GraphIndexBuilder::new(2, AknnGraphBuilder::new().with_k(3).with_rho(1.0))
            .build(&ctx, &line_rows(n))
            .unwrap()
    }

    #[test]
    fn descent_reaches_the_nearest_vertex() {
        let index = build_line_index(24);
        let ctx = Context::new();
        let env = ctx.linalg::<f32>();
        let query = [7.2f32, 0.0];
        let dist = |i: u32| env.sq_l2(&query, index.features.get(i as usize));

        let nearest = index.find_approx_nearest(0, &dist).unwrap();
        assert_eq!(nearest.item, 7);
    }

    #[test]
    fn out_of_range_entries_are_skipped() {
        let index = build_line_index(8);
        let ctx = Context::new();

        let results = search(
            index.search_channel_with_entries(&ctx, &[3.0, 0.0], vec![500, 2]),
            1,
            64,
        );
        assert_eq!(results[0].index, 3);
    }

    #[test]
    fn entry_seeded_search_matches_brute_force() {
        let index = build_line_index(24);
        let ctx = Context::new();

        let entries: Vec<u32> = (0..24).collect();
        let results = search(
            index.search_channel_with_entries(&ctx, &[11.4, 0.0], entries),
            4,
            256,
        );
        let indices: Vec<u32> = results.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![11, 12, 10, 13]);
    }

    #[test]
    fn empty_pool_is_rejected() {
        let ctx = Context::new();
        let builder = GraphIndexBuilder::new(2, AknnGraphBuilder::new());
        let result: Result<GraphIndex<f32>> = builder.build(&ctx, &[]);
        assert!(matches!(result, Err(Error::EmptyPool)));
    }
}
