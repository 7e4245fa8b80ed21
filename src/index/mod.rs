//! Index engines and the shared search protocol.
//!
//! A builder ingests feature rows and produces an index that owns its
//! corpus. Every index exposes [`Index::search_channel`], a lazy stream of
//! candidates in approximately increasing distance; the [`search`]
//! coordinator is the single place that enforces global order and
//! uniqueness over such a stream.

mod bsp_tree;
mod composite;
mod flat;
mod graph;
mod mutable;

pub use bsp_tree::{BspTreeIndex, BspTreeIndexBuilder};
pub use composite::{CompositeIndex, CompositeIndexBuilder};
pub use flat::{FlatIndex, FlatIndexBuilder};
pub use graph::{GraphIndex, GraphIndexBuilder};
pub use mutable::MutableIndex;

use std::collections::HashSet;
use std::io::Write;

use crate::collection::{PriorityQueue, WithPriority};
use crate::context::Context;
use crate::error::Result;
use crate::scalar::Scalar;

/// One search candidate: corpus index plus squared L2 distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchResult {
    pub index: u32,
    pub distance: f32,
}

/// Lazy candidate stream. Within one stream, candidates arrive in
/// non-strictly-increasing distance per tree or per entry-point descent;
/// indices may repeat across trees or descents.
pub type SearchStream<'a> = Box<dyn Iterator<Item = SearchResult> + 'a>;

/// Built, searchable index over an owned, immutable corpus.
pub trait Index<T: Scalar> {
    /// Opens a lazy candidate stream for `query`. The stream ends on
    /// exhaustion, on cancellation, or when the consumer stops pulling.
    fn search_channel<'a>(&'a self, ctx: &'a Context, query: &'a [T]) -> SearchStream<'a>;

    /// Serializes the index, self-describing header included.
    fn save(&self, w: &mut dyn Write) -> Result<()>;

    /// Top-`k` search: reads at most `max_candidates` stream items and
    /// reduces them to the `k` nearest unique indices.
    fn search(
        &self,
        ctx: &Context,
        query: &[T],
        k: usize,
        max_candidates: usize,
    ) -> Vec<SearchResult> {
        search(self.search_channel(ctx, query), k, max_candidates)
    }
}

/// Index whose descent can be seeded with explicit entry points.
pub trait EntryPointIndex<T: Scalar>: Index<T> {
    fn search_channel_with_entries<'a>(
        &'a self,
        ctx: &'a Context,
        query: &'a [T],
        entries: Vec<u32>,
    ) -> SearchStream<'a>;
}

/// Builder producing an immutable index from feature rows.
pub trait IndexBuilder<T: Scalar> {
    type Output: Index<T>;

    fn build(&self, ctx: &Context, features: &[Vec<T>]) -> Result<Self::Output>;
}

/// Reduces a candidate stream to the `k` nearest unique indices.
///
/// Reads up to `max_candidates` items, heapifies them in O(m), then pops in
/// distance order while skipping indices already emitted. Returns early
/// results when the stream holds fewer than `k` unique indices.
pub fn search(
    stream: impl Iterator<Item = SearchResult>,
    k: usize,
    max_candidates: usize,
) -> Vec<SearchResult> {
    let items: Vec<WithPriority<u32>> = stream
        .take(max_candidates)
        .map(|c| WithPriority {
            item: c.index,
            priority: c.distance,
        })
        .collect();
    let mut queue = PriorityQueue::from_slice(items);

    let mut results = Vec::with_capacity(k.min(queue.len()));
    let mut founds = HashSet::with_capacity(queue.len());
    while results.len() < k {
        let Ok(entry) = queue.pop() else {
            break;
        };
        if !founds.insert(entry.item) {
            continue;
        }
        results.push(SearchResult {
            index: entry.item,
            distance: entry.priority,
        });
    }
    results
}
