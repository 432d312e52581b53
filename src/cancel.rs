//! Cooperative cancellation for long-running embed/extract passes.
//!
//! Every streaming loop polls the token once per chunk and bails out with
//! [`IntuneWinError::Cancelled`]. Nothing is swapped into the envelope
//! until a pass completes, so a cancelled embed leaves the package as it was.

use crate::error::IntuneWinError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Clears the flag so the token can be reused for a retry.
    pub fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Returns `Err(Cancelled)` if `token` is set.
#[inline]
pub(crate) fn check(token: Option<&CancelToken>) -> Result<(), IntuneWinError> {
    match token {
        Some(t) if t.is_cancelled() => Err(IntuneWinError::Cancelled),
        _ => Ok(()),
    }
}
