//! NN-Descent: iterative k-NN graph refinement by local joins.
//!
//! Follows Dong, Moses and Li, "Efficient K-Nearest Neighbor Graph
//! Construction for Generic Similarity Measures" (WWW 2011). Each round
//! samples forward and reverse neighborhoods, joins every pair inside a
//! vertex's sampled neighborhood, then prunes each vertex back to its `k`
//! best distinct neighbors. Rounds are synchronous: all joins finish before
//! pruning starts.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use smallvec::SmallVec;

use super::{Graph, GraphNode};

/// Per-vertex scratch heap used during refinement.
///
/// A single backing pair of arrays is split into three regions:
/// `[0, accepted)` holds accepted neighbors, `[accepted, base)` holds
/// dropped ones, and `[base, len)` is the pending pool, shaped as a min-heap
/// whose root sits at the *end* of the array. One allocation per vertex
/// keeps accept/drop at O(log n) swaps without moving region boundaries
/// through memory.
#[derive(Debug, Clone, Default)]
pub struct NeighborHeap {
    pub neighbors: Vec<u32>,
    pub dists: Vec<f32>,
    base: usize,
    accepted: usize,
    last_lower_bound: f32,
    last_accepted: usize,
}

impl NeighborHeap {
    /// Number of pending entries.
    pub fn len(&self) -> usize {
        self.neighbors.len() - self.base
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends a pending entry. The heap shape is restored lazily by
    /// [`NeighborHeap::heapify`].
    pub fn add(&mut self, idx: u32, dist: f32) {
        self.neighbors.push(idx);
        self.dists.push(dist);
    }

    fn swap_entries(&mut self, i: usize, j: usize) {
        self.neighbors.swap(i, j);
        self.dists.swap(i, j);
    }

    fn less(&self, i: usize, j: usize) -> bool {
        self.dists[i] < self.dists[j]
    }

    /// Smallest pending entry, sitting at the reverse-end heap root.
    pub fn peek(&self) -> Option<(u32, f32)> {
        if self.is_empty() {
            return None;
        }
        let head = self.neighbors.len() - 1;
        Some((self.neighbors[head], self.dists[head]))
    }

    /// Moves the pending head into the accepted region.
    pub fn accept(&mut self) -> bool {
        if self.is_empty() {
            return false;
        }
        let head = self.neighbors.len() - 1;
        self.swap_entries(head, self.base);
        self.base += 1;
        self.swap_entries(self.accepted, self.base - 1);
        self.accepted += 1;
        self.sift_down(head as isize, self.base as isize);
        true
    }

    /// Discards the pending head into the dropped region.
    pub fn drop_head(&mut self) -> bool {
        if self.is_empty() {
            return false;
        }
        let head = self.neighbors.len() - 1;
        self.swap_entries(head, self.base);
        self.base += 1;
        self.sift_down(head as isize, self.base as isize);
        true
    }

    /// Reshapes the pending region into a reverse-end min-heap.
    pub fn heapify(&mut self) {
        let n = self.len() as isize;
        let len = self.neighbors.len() as isize;
        for i in (0..n / 2).rev() {
            self.sift_down(len - i - 1, self.base as isize);
        }
    }

    /// Restores the heap property downward from `i0`. The pending region
    /// grows toward index `base`; child slots of `i` are `2i - head - 1` and
    /// its left sibling, mirrored around the array end.
    fn sift_down(&mut self, i0: isize, base: isize) -> bool {
        let bound = base - 1;
        let head = self.neighbors.len() as isize - 1;
        let mut i = i0;
        loop {
            let j1 = head + 2 * (i - head) - 1;
            if j1 <= bound || head < j1 {
                break;
            }
            let j = self.lesser_sibling(j1, bound);
            if !self.less(j as usize, i as usize) {
                break;
            }
            self.swap_entries(i as usize, j as usize);
            i = j;
        }
        i < i0
    }

    fn lesser_sibling(&self, l_idx: isize, bound: isize) -> isize {
        let r_idx = l_idx - 1;
        if bound < r_idx && self.less(r_idx as usize, l_idx as usize) {
            r_idx
        } else {
            l_idx
        }
    }

    /// Compacts the arrays to the accepted prefix and resets the cursors.
    /// Reports whether the accepted count or its distance lower bound moved
    /// since the previous shrink.
    pub fn shrink(&mut self) -> bool {
        let mut changed = self.last_accepted != self.accepted;
        if self.accepted > 0 {
            changed = changed || self.last_lower_bound != self.dists[self.accepted - 1];
            self.last_lower_bound = self.dists[self.accepted - 1];
        }

        self.neighbors.truncate(self.accepted);
        self.dists.truncate(self.accepted);
        self.last_accepted = self.accepted;
        self.base = 0;
        self.accepted = 0;
        changed
    }

    /// Appends every entry of `other`.
    pub fn merge(&mut self, other: &NeighborHeap) {
        for i in 0..other.neighbors.len() {
            self.add(other.neighbors[i], other.dists[i]);
        }
    }

    /// Removes a random `⌊rho·len⌋`-entry sample and returns it.
    pub fn split(&mut self, rho: f64, rng: &mut StdRng) -> NeighborHeap {
        let n = self.len();
        let k = (rho * n as f64) as usize;
        // Tandem Fisher-Yates over both arrays.
        for i in (1..n).rev() {
            let j = rng.gen_range(0..=i);
            self.swap_entries(i, j);
        }

        let rest_neighbors = self.neighbors.split_off(k);
        let rest_dists = self.dists.split_off(k);
        NeighborHeap {
            neighbors: std::mem::replace(&mut self.neighbors, rest_neighbors),
            dists: std::mem::replace(&mut self.dists, rest_dists),
            ..NeighborHeap::default()
        }
    }

    /// Drops pending heads whose id was already accepted elsewhere; returns
    /// the first novel head, if any.
    fn drop_duplicates(&mut self, founds: &HashSet<u32>) -> Option<(u32, f32)> {
        loop {
            let (idx, dist) = self.peek()?;
            if !founds.contains(&idx) {
                return Some((idx, dist));
            }
            self.drop_head();
        }
    }
}

/// Forward or reverse neighborhood sample, one heap per vertex.
#[derive(Debug, Clone, Default)]
struct SampledGraph {
    nodes: Vec<NeighborHeap>,
}

impl SampledGraph {
    fn new(n: usize) -> Self {
        Self {
            nodes: vec![NeighborHeap::default(); n],
        }
    }

    fn split(&mut self, rho: f64, rng: &mut StdRng) -> Self {
        Self {
            nodes: self.nodes.iter_mut().map(|n| n.split(rho, rng)).collect(),
        }
    }

    /// Reverse adjacency, sampled down by `rho`. Distances are not carried;
    /// the local join recomputes them.
    fn reverse(&self, rho: f64, rng: &mut StdRng) -> Self {
        let mut rev = Self::new(self.nodes.len());
        for (i, node) in self.nodes.iter().enumerate() {
            for &j in &node.neighbors {
                rev.nodes[j as usize].add(i as u32, 0.0);
            }
        }
        rev.split(rho, rng)
    }
}

/// One NN-Descent refinement state over `n` vertices.
///
/// `fixed` is the accepted history, `candidate` the current round's
/// additions; both are locked per vertex so the local join can mutate
/// neighborhoods concurrently.
pub struct Nndescent<D> {
    fixed: Vec<Mutex<NeighborHeap>>,
    candidate: Vec<Mutex<NeighborHeap>>,
    k: usize,
    rho: f64,
    dist: D,
}

impl<D> Nndescent<D>
where
    D: Fn(u32, u32) -> f32 + Send + Sync,
{
    pub fn new(init: &Graph, k: usize, rho: f64, dist: D) -> Self {
        let candidate = init
            .nodes
            .iter()
            .enumerate()
            .map(|(i, node)| {
                let mut heap = NeighborHeap::default();
                for &j in &node.neighbors {
                    heap.add(j, dist(i as u32, j));
                }
                Mutex::new(heap)
            })
            .collect();

        Self {
            fixed: (0..init.nodes.len())
                .map(|_| Mutex::new(NeighborHeap::default()))
                .collect(),
            candidate,
            k,
            rho,
            dist,
        }
    }

    /// One refinement round on `pool`; returns the number of vertices whose
    /// accepted neighborhood changed.
    pub fn update(&mut self, pool: &rayon::ThreadPool) -> u64 {
        self.local_join(pool);
        self.prune(pool)
    }

    fn local_join(&mut self, pool: &rayon::ThreadPool) {
        let mut rng = StdRng::from_entropy();
        let rho = self.rho;

        // Sampling runs single-threaded on exclusive borrows; only the join
        // loop below is concurrent.
        let new = SampledGraph {
            nodes: self
                .candidate
                .iter_mut()
                .map(|m| m.get_mut().split(rho, &mut rng))
                .collect(),
        };
        let rold = {
            let mut rev = SampledGraph::new(self.fixed.len());
            for (i, m) in self.fixed.iter_mut().enumerate() {
                for &j in &m.get_mut().neighbors {
                    rev.nodes[j as usize].add(i as u32, 0.0);
                }
            }
            rev.split(rho, &mut rng)
        };
        let rnew = new.reverse(rho, &mut rng);

        let candidate = &self.candidate;
        let fixed = &self.fixed;
        let dist = &self.dist;
        pool.install(|| {
            (0..candidate.len()).into_par_iter().for_each(|v| {
                let join = |u1: u32, u2: u32| {
                    let d = dist(u1, u2);
                    candidate[u1 as usize].lock().add(u2, d);
                    candidate[u2 as usize].lock().add(u1, d);
                };

                for &u1 in &new.nodes[v].neighbors {
                    for &u2 in &new.nodes[v].neighbors {
                        if u2 <= u1 {
                            continue;
                        }
                        join(u1, u2);
                    }
                    for &u2 in &rnew.nodes[v].neighbors {
                        if u2 <= u1 {
                            continue;
                        }
                        join(u1, u2);
                    }
                    {
                        let old = fixed[v].lock();
                        for &u2 in &old.neighbors {
                            if u2 == u1 {
                                continue;
                            }
                            join(u1, u2);
                        }
                    }
                    for &u2 in &rold.nodes[v].neighbors {
                        if u2 == u1 {
                            continue;
                        }
                        join(u1, u2);
                    }
                }
            });
        });

        // Fold the sampled-out entries back into the accepted history.
        for (m, node) in self.fixed.iter_mut().zip(&new.nodes) {
            m.get_mut().merge(node);
        }
    }

    fn prune(&mut self, pool: &rayon::ThreadPool) -> u64 {
        let changes = AtomicU64::new(0);
        let k = self.k;
        let fixed = &self.fixed;
        let candidate = &self.candidate;

        pool.install(|| {
            (0..fixed.len()).into_par_iter().for_each(|v| {
                let mut fx = fixed[v].lock();
                let mut cd = candidate[v].lock();
                fx.heapify();
                cd.heapify();

                let mut founds = HashSet::new();
                for _ in 0..k {
                    let fixed_head = fx.drop_duplicates(&founds);
                    let cand_head = cd.drop_duplicates(&founds);

                    match (fixed_head, cand_head) {
                        (None, None) => break,
                        (Some((fi, fd)), Some((_, cdist))) if fd <= cdist => {
                            fx.accept();
                            founds.insert(fi);
                        }
                        (Some((fi, _)), None) => {
                            fx.accept();
                            founds.insert(fi);
                        }
                        (_, Some((ci, _))) => {
                            cd.accept();
                            founds.insert(ci);
                        }
                    }
                }

                let fixed_changed = fx.shrink();
                let cand_changed = cd.shrink();
                if fixed_changed || cand_changed {
                    changes.fetch_add(1, Ordering::Relaxed);
                }
            });
        });

        changes.into_inner()
    }

    /// Final neighbor lists: accepted history plus surviving candidates.
    pub fn create(mut self) -> Graph {
        let nodes = self
            .fixed
            .iter_mut()
            .zip(self.candidate.iter_mut())
            .map(|(f, c)| {
                let mut neighbors: SmallVec<[u32; 16]> = SmallVec::new();
                neighbors.extend_from_slice(&f.get_mut().neighbors);
                neighbors.extend_from_slice(&c.get_mut().neighbors);
                GraphNode { neighbors }
            })
            .collect();
        Graph { nodes }
    }
}
