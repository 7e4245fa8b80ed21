//! Shared container primitives for the search engines.

mod partition;
mod priority_queue;

pub use partition::partition;
pub use priority_queue::{PriorityQueue, UniquePriorityQueue, WithPriority};
