//! Highest fully dispatched block.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared, monotone record of the last block whose events were all handed to
/// the handler chain. Cloning shares the underlying counter.
#[derive(Debug, Clone, Default)]
pub struct Watermark {
    // block + 1; 0 = nothing dispatched yet
    inner: Arc<AtomicU64>,
}

impl Watermark {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value, `None` until the first advance.
    pub fn get(&self) -> Option<u64> {
        match self.inner.load(Ordering::Acquire) {
            0 => None,
            n => Some(n - 1),
        }
    }

    /// Raise the watermark to `block`; lower values are ignored.
    pub fn advance(&self, block: u64) {
        self.inner
            .fetch_max(block.saturating_add(1), Ordering::AcqRel);
    }

    /// First block not yet covered, or `None` if nothing was dispatched.
    pub fn resume_from(&self) -> Option<u64> {
        self.get().map(|b| b.saturating_add(1))
    }
}
