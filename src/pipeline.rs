//! Lazy stream combinators shared by the search paths.
//!
//! Streams are plain iterators pulled by the consumer. The contract matches
//! a bounded-channel pipeline without the channel overhead; a concurrent
//! producer could swap in behind the same shapes.

use std::collections::HashSet;
use std::hash::Hash;

use crate::context::Context;

/// First `n` items of a stream.
pub fn take<I: Iterator>(n: usize, input: I) -> impl Iterator<Item = I::Item> {
    input.take(n)
}

/// Drops items whose key was already emitted on this stream.
pub fn unique_by<I, K, F>(input: I, mut key: F) -> impl Iterator<Item = I::Item>
where
    I: Iterator,
    K: Eq + Hash,
    F: FnMut(&I::Item) -> K,
{
    let mut seen = HashSet::new();
    input.filter(move |item| seen.insert(key(item)))
}

/// Drops items that were already emitted on this stream.
pub fn unique<I>(input: I) -> impl Iterator<Item = I::Item>
where
    I: Iterator,
    I::Item: Eq + Hash + Clone,
{
    unique_by(input, Clone::clone)
}

/// The sequence `0..n`.
pub fn seq(n: usize) -> impl Iterator<Item = usize> {
    0..n
}

/// Drains a stream into a vector.
pub fn to_slice<I: Iterator>(input: I) -> Vec<I::Item> {
    input.collect()
}

/// Forwards items until the context is cancelled.
pub fn or_done<'a, I>(ctx: &'a Context, input: I) -> impl Iterator<Item = I::Item> + 'a
where
    I: Iterator + 'a,
{
    input.take_while(move |_| !ctx.is_cancelled())
}
