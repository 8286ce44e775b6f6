//! Cooperative cancellation of the command in progress.
//!
//! The engine never preempts a running command. Instead it marks a command
//! as in progress while `execute`/`redo` run, and a [`CancelHandle`] held by
//! the surrounding UI (an Escape key binding, say) can request cancellation.
//! Commands observe the request through the [`CancelToken`] in their
//! [`ExecContext`](crate::ExecContext) and decide for themselves when to stop.
//!
//! # Example
//!
//! ```
//! use draft_engine::cancellation::CancelHandle;
//!
//! let handle = CancelHandle::new();
//! let token = handle.token();
//!
//! // Nothing is running, so there is nothing to cancel.
//! assert!(!handle.cancel());
//! assert!(!token.is_cancelled());
//! ```

#![forbid(unsafe_code)]

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

struct CancelState {
    in_progress: AtomicBool,
    cancelled: AtomicBool,
}

impl CancelState {
    fn new() -> Self {
        Self {
            in_progress: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
        }
    }
}

/// Cloneable control handle for the engine's command-in-progress flag.
///
/// Dropping the handle does **not** cancel anything.
#[derive(Clone)]
pub struct CancelHandle {
    inner: Arc<CancelState>,
}

/// Read side of a [`CancelHandle`], polled by running commands.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<CancelState>,
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle")
            .field("in_progress", &self.is_in_progress())
            .field("cancelled", &self.inner.cancelled.load(Ordering::Acquire))
            .finish()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl CancelHandle {
    /// Create an idle handle.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CancelState::new()),
        }
    }

    /// Obtain a token observing this handle.
    pub fn token(&self) -> CancelToken {
        CancelToken {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Request cancellation of the command in progress.
    ///
    /// Returns `false` (and does nothing) when no command is running.
    pub fn cancel(&self) -> bool {
        if !self.is_in_progress() {
            return false;
        }
        self.inner.cancelled.store(true, Ordering::Release);
        true
    }

    /// Whether a command is currently executing.
    pub fn is_in_progress(&self) -> bool {
        self.inner.in_progress.load(Ordering::Acquire)
    }

    /// Mark a command as started; clears any stale request.
    pub(crate) fn begin(&self) {
        self.inner.cancelled.store(false, Ordering::Release);
        self.inner.in_progress.store(true, Ordering::Release);
    }

    /// Mark the running command as finished.
    pub(crate) fn finish(&self) {
        self.inner.in_progress.store(false, Ordering::Release);
        self.inner.cancelled.store(false, Ordering::Release);
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    /// A token that never reports cancellation.
    pub fn never() -> Self {
        CancelHandle::new().token()
    }

    /// Returns `true` if cancellation has been requested.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_handle_ignores_cancel() {
        let handle = CancelHandle::new();
        let token = handle.token();
        assert!(!handle.is_in_progress());
        assert!(!handle.cancel());
        assert!(!token.is_cancelled());
    }

    #[test]
    fn cancel_during_progress_reaches_token() {
        let handle = CancelHandle::new();
        let token = handle.token();
        handle.begin();
        assert!(handle.cancel());
        assert!(token.is_cancelled());
    }

    #[test]
    fn finish_clears_request() {
        let handle = CancelHandle::new();
        let token = handle.token();
        handle.begin();
        handle.cancel();
        handle.finish();
        assert!(!token.is_cancelled());
        assert!(!handle.is_in_progress());
    }

    #[test]
    fn begin_clears_stale_request() {
        let handle = CancelHandle::new();
        let token = handle.token();
        handle.begin();
        handle.cancel();
        handle.begin();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn clones_share_state() {
        let handle = CancelHandle::new();
        let other = handle.clone();
        let token = handle.token().clone();
        handle.begin();
        assert!(other.is_in_progress());
        assert!(other.cancel());
        assert!(token.is_cancelled());
    }

    #[test]
    fn never_token_is_not_cancelled() {
        assert!(!CancelToken::never().is_cancelled());
    }
}
