//! Exhaustive flat index.
//!
//! Scans the whole corpus per query and streams candidates in exact
//! distance order, which makes it the ground truth for every approximate
//! engine. Accepts an empty corpus.

use std::io::Write;

use serde::{Deserialize, Serialize};

use super::{Index, IndexBuilder, SearchResult, SearchStream};
use crate::collection::{PriorityQueue, WithPriority};
use crate::context::Context;
use crate::error::Result;
use crate::features::Features;
use crate::persistence::{self, IndexKind};
use crate::scalar::Scalar;

/// Brute-force index over an owned corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatIndex<T> {
    features: Features<T>,
}

impl<T: Scalar> FlatIndex<T> {
    pub(crate) fn from_features(features: Features<T>) -> Self {
        Self { features }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl<T: Scalar> Index<T> for FlatIndex<T> {
    fn search_channel<'a>(&'a self, ctx: &'a Context, query: &'a [T]) -> SearchStream<'a> {
        let env = ctx.linalg::<T>();
        let items: Vec<WithPriority<u32>> = (0..self.features.len())
            .map(|i| WithPriority {
                item: i as u32,
                priority: env.sq_l2(query, self.features.get(i)),
            })
            .collect();
        let mut queue = PriorityQueue::from_slice(items);

        Box::new(std::iter::from_fn(move || {
            if ctx.is_cancelled() {
                return None;
            }
            queue.pop().ok().map(|entry| SearchResult {
                index: entry.item,
                distance: entry.priority,
            })
        }))
    }

    fn save(&self, w: &mut dyn Write) -> Result<()> {
        persistence::save_index(self, IndexKind::Flat, T::KIND, w)
    }
}

/// Builder for [`FlatIndex`].
#[derive(Debug, Clone, Copy)]
pub struct FlatIndexBuilder {
    dim: usize,
}

impl FlatIndexBuilder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl<T: Scalar> IndexBuilder<T> for FlatIndexBuilder {
    type Output = FlatIndex<T>;

    fn build(&self, _ctx: &Context, features: &[Vec<T>]) -> Result<FlatIndex<T>> {
        Ok(FlatIndex {
            features: Features::from_rows(self.dim, features)?,
        })
    }
}
