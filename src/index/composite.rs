//! Composite index: one index seeds entry points for another.
//!
//! The head produces ordinary candidates; the first `entries_num` of them
//! become entry points for the tail's descent. The usual composition is a
//! shallow tree head over a graph tail, replacing the graph's random entry
//! points with leaf items near the query.

use std::io::Write;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use super::{EntryPointIndex, Index, IndexBuilder, SearchResult, SearchStream};
use crate::context::Context;
use crate::error::Result;
use crate::persistence::{self, IndexKind};
use crate::pipeline;
use crate::scalar::Scalar;

/// Head/tail pair with an entry-point budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeIndex<T, H, E> {
    head: H,
    tail: E,
    entries_num: usize,
    #[serde(skip)]
    _marker: PhantomData<fn() -> T>,
}

impl<T, H, E> CompositeIndex<T, H, E> {
    pub fn head(&self) -> &H {
        &self.head
    }

    pub fn tail(&self) -> &E {
        &self.tail
    }
}

impl<T, H, E> Index<T> for CompositeIndex<T, H, E>
where
    T: Scalar,
    H: Index<T> + Serialize,
    E: EntryPointIndex<T> + Serialize,
{
    fn search_channel<'a>(&'a self, ctx: &'a Context, query: &'a [T]) -> SearchStream<'a> {
        let entries: Vec<u32> = pipeline::or_done(ctx, self.head.search_channel(ctx, query))
            .take(self.entries_num)
            .map(|c| c.index)
            .collect();

        Box::new(pipeline::or_done(
            ctx,
            self.tail.search_channel_with_entries(ctx, query, entries),
        ))
    }

    fn save(&self, w: &mut dyn Write) -> Result<()> {
        persistence::save_index(self, IndexKind::Composite, T::KIND, w)
    }
}

/// Builder pairing a head builder with a tail builder.
#[derive(Debug, Clone)]
pub struct CompositeIndexBuilder<HB, TB> {
    head: HB,
    tail: TB,
    entries_num: usize,
}

impl<HB, TB> CompositeIndexBuilder<HB, TB> {
    pub fn new(head: HB, tail: TB) -> Self {
        Self {
            head,
            tail,
            entries_num: 1,
        }
    }

    /// Number of head candidates forwarded as tail entry points.
    pub fn with_entries_num(mut self, entries_num: usize) -> Self {
        self.entries_num = entries_num.max(1);
        self
    }
}

impl<T, HB, TB> IndexBuilder<T> for CompositeIndexBuilder<HB, TB>
where
    T: Scalar,
    HB: IndexBuilder<T>,
    TB: IndexBuilder<T>,
    HB::Output: Serialize,
    TB::Output: EntryPointIndex<T> + Serialize,
{
    type Output = CompositeIndex<T, HB::Output, TB::Output>;

    fn build(&self, ctx: &Context, features: &[Vec<T>]) -> Result<Self::Output> {
        let head = self.head.build(ctx, features)?;
        let tail = self.tail.build(ctx, features)?;

        Ok(CompositeIndex {
            head,
            tail,
            entries_num: self.entries_num,
            _marker: PhantomData,
        })
    }
}
