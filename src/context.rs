//! Ambient build/search state: kernel configuration plus cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::linalg::{LinAlg, LinAlgConfig};
use crate::scalar::Scalar;

/// Cooperative cancellation handle shared between a caller and running
/// build/search loops.
///
/// Cloning shares the underlying flag; cancelling any clone cancels all of
/// them.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Loops observe the flag before each work item
    /// and before each emission, so they exit promptly but not instantly.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Worker count used when a builder is not configured explicitly.
pub(crate) fn default_procs() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}

/// Value passed through every build and search call.
///
/// The kernel backend is resolved from the context at use time and is never
/// part of an index's persisted state.
#[derive(Debug, Clone, Default)]
pub struct Context {
    linalg: LinAlgConfig,
    cancel: Option<CancellationToken>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_linalg(mut self, config: LinAlgConfig) -> Self {
        self.linalg = config;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Resolve the kernel backend for element type `T`.
    pub fn linalg<T: Scalar>(&self) -> LinAlg<T> {
        LinAlg::new(&self.linalg)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map_or(false, CancellationToken::is_cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_context_is_not_cancelled() {
        assert!(!Context::new().is_cancelled());
    }

    #[test]
    fn cancellation_is_shared_between_clones() {
        let token = CancellationToken::new();
        let ctx = Context::new().with_cancellation(token.clone());
        let other = ctx.clone();

        token.cancel();
        assert!(ctx.is_cancelled());
        assert!(other.is_cancelled());
    }
}
