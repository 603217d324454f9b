//! Process-Wide Cancellation
//!
//! One flag honored at safe points: the harvester between batches, the
//! local scanner between files, the pipeline between stages. In-flight
//! requests and pool work items run to completion.
//!
//! Components hold a [`CancelToken`]; the default token reads the
//! process-wide flag the signal handler sets, a local token scopes
//! cancellation to one run.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

static CANCELLED: AtomicBool = AtomicBool::new(false);
static REQUESTS: AtomicUsize = AtomicUsize::new(0);

/// Request a process-wide clean stop. Returns how many times a stop has
/// been requested; callers treat the second request as an abort.
pub fn request_stop() -> usize {
    CANCELLED.store(true, Ordering::SeqCst);
    REQUESTS.fetch_add(1, Ordering::SeqCst) + 1
}

/// Whether a process-wide stop has been requested.
pub fn is_cancelled() -> bool {
    CANCELLED.load(Ordering::SeqCst)
}

/// Clear the process-wide flag, for reuse after a clean stop completed.
pub fn reset() {
    CANCELLED.store(false, Ordering::SeqCst);
    REQUESTS.store(0, Ordering::SeqCst);
}

#[derive(Debug, Clone)]
enum TokenKind {
    Global,
    Local(Arc<AtomicBool>),
}

/// A cancellation watch held by long-running components.
#[derive(Debug, Clone)]
pub struct CancelToken {
    kind: TokenKind,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::global()
    }
}

impl CancelToken {
    /// Token observing the process-wide flag.
    pub fn global() -> Self {
        Self {
            kind: TokenKind::Global,
        }
    }

    /// Isolated token for one run (and for tests).
    pub fn local() -> Self {
        Self {
            kind: TokenKind::Local(Arc::new(AtomicBool::new(false))),
        }
    }

    /// Request a stop on this token.
    pub fn request_stop(&self) {
        match &self.kind {
            TokenKind::Global => {
                request_stop();
            }
            TokenKind::Local(flag) => flag.store(true, Ordering::SeqCst),
        }
    }

    /// Whether a stop has been requested on this token.
    pub fn is_cancelled(&self) -> bool {
        match &self.kind {
            TokenKind::Global => is_cancelled(),
            TokenKind::Local(flag) => flag.load(Ordering::SeqCst),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_token_isolated() {
        let a = CancelToken::local();
        let b = CancelToken::local();
        a.request_stop();
        assert!(a.is_cancelled());
        assert!(!b.is_cancelled());

        // Clones share the flag
        let c = a.clone();
        assert!(c.is_cancelled());
    }

    #[test]
    fn test_global_token_follows_process_flag() {
        // Serialized with nothing: every other test uses local tokens
        reset();
        let token = CancelToken::global();
        assert!(!token.is_cancelled());
        assert_eq!(request_stop(), 1);
        assert!(token.is_cancelled());
        assert_eq!(request_stop(), 2);
        reset();
        assert!(!token.is_cancelled());
    }
}
