//! Rebuild-on-insert wrapper over any index builder.
//!
//! The underlying engines treat the corpus as immutable after build; this
//! wrapper recovers a mutable surface by owning the feature pool and
//! rebuilding the whole index whenever a search observes a stale state.

use crate::context::Context;
use crate::error::{Error, Result};
use crate::index::{search, Index, IndexBuilder, SearchResult};
use crate::scalar::Scalar;

/// Feature pool plus a lazily (re)built inner index.
pub struct MutableIndex<T: Scalar, B: IndexBuilder<T>> {
    builder: B,
    pool: Vec<Vec<T>>,
    inner: Option<B::Output>,
}

impl<T: Scalar, B: IndexBuilder<T>> MutableIndex<T, B> {
    pub fn new(builder: B) -> Self {
        Self {
            builder,
            pool: Vec::new(),
            inner: None,
        }
    }

    /// Appends a feature; any previously built index becomes stale.
    pub fn add(&mut self, feature: Vec<T>) {
        self.pool.push(feature);
        self.inner = None;
    }

    pub fn has_index(&self) -> bool {
        self.inner.is_some()
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// (Re)builds the inner index over the whole pool.
    pub fn build(&mut self, ctx: &Context) -> Result<()> {
        self.inner = Some(self.builder.build(ctx, &self.pool)?);
        Ok(())
    }

    /// Borrows the built index.
    pub fn index(&self) -> Result<&B::Output> {
        self.inner.as_ref().ok_or(Error::NotBuilt)
    }

    /// Searches, rebuilding first when stale.
    pub fn search(
        &mut self,
        ctx: &Context,
        query: &[T],
        k: usize,
        max_candidates: usize,
    ) -> Result<Vec<SearchResult>> {
        if self.inner.is_none() {
            self.build(ctx)?;
        }
        let inner = self.inner.as_ref().ok_or(Error::NotBuilt)?;
        Ok(search(
            inner.search_channel(ctx, query),
            k,
            max_candidates,
        ))
    }
}
