//! proxima: in-process approximate nearest-neighbor search over dense
//! feature vectors.
//!
//! Given `N` corpus vectors in dimension `D` and a query, every index
//! returns the `k` nearest corpus indices under squared Euclidean distance.
//! Corpora are immutable after build; element types are `f32` and `u8`.
//!
//! # Which Index Should I Use?
//!
//! | Situation | Recommendation |
//! |-----------|----------------|
//! | Small corpus, exact results | [`index::FlatIndex`] |
//! | Low/medium dimensions | [`index::BspTreeIndex`] with KD planes |
//! | Higher dimensions | [`index::BspTreeIndex`] with RP planes, more trees |
//! | Large corpus, high recall per candidate | [`index::GraphIndex`] |
//! | Graph recall without random entry points | [`index::CompositeIndex`] (tree head, graph tail) |
//!
//! Trees trade build time for decorrelated coverage: a forest of randomized
//! KD or RP trees is searched with one shared best-first frontier. The
//! graph engine runs NN-Descent at build time and greedy descent at query
//! time. The composite index feeds the tree's closest leaf items to the
//! graph as entry points, which combats bad random starts.
//!
//! # Search protocol
//!
//! Every index exposes a lazy candidate stream via
//! [`Index::search_channel`]; the [`search`] coordinator caps it at
//! `max_candidates`, de-duplicates, and returns the best `k`. Raising
//! `max_candidates` buys recall with query time.
//!
//! ```
//! use proxima::index::{FlatIndexBuilder, Index, IndexBuilder};
//! use proxima::Context;
//!
//! let ctx = Context::new();
//! let rows = vec![vec![0.0_f32, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]];
//! let index = FlatIndexBuilder::new(2).build(&ctx, &rows)?;
//!
//! let hits = index.search(&ctx, &[0.9, 0.1], 1, 8);
//! assert_eq!(hits[0].index, 1);
//! # Ok::<(), proxima::Error>(())
//! ```
//!
//! Builds parallelize over a bounded worker pool; searches are
//! single-threaded per query and any number may run concurrently over one
//! index. A [`CancellationToken`] aborts long-running builds and searches
//! cooperatively.

pub mod bsp;
pub mod collection;
pub mod context;
pub mod error;
pub mod features;
pub mod graph;
pub mod index;
pub mod linalg;
pub mod persistence;
pub mod pipeline;
pub mod scalar;

pub use context::{CancellationToken, Context};
pub use error::{Error, Result};
pub use index::{
    search, EntryPointIndex, Index, IndexBuilder, SearchResult, SearchStream,
};
pub use scalar::Scalar;
