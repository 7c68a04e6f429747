use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use crate::error::{IndexError, IndexResult};

/// Shared flag that stops long-running lookups. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// `Err(Cancelled)` once [`CancelToken::cancel`] has been called.
    pub fn check(&self) -> IndexResult<()> {
        if self.is_cancelled() {
            return Err(IndexError::Cancelled);
        }
        Ok(())
    }
}
