//! Parallel Execution Substrate
//!
//! The pools that drive ingestion and harvesting: a rayon-backed CPU pool
//! for extraction/NLP/distillation, an I/O thread pool with optional rate
//! limiting, a semaphore-bounded async pool, a DAG pipeline mixing pool
//! kinds per stage, and a bounded-queue batch processor for backpressure.
//! Every `map` preserves input order in its output regardless of
//! completion order.

mod async_pool;
mod batch;
mod pipeline;
mod pool;

pub use async_pool::AsyncPool;
pub use batch::BatchProcessor;
pub use pipeline::{Pipeline, PoolKind, StageCallback, StageConfig};
pub use pool::{CpuPool, ThreadPool};

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Instant;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Executor error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// Adding the stage would create a cycle
    #[error("stage '{0}' would create a dependency cycle")]
    Cycle(String),
    /// A declared dependency does not exist
    #[error("stage '{stage}' depends on unknown stage '{dependency}'")]
    UnknownDependency {
        /// Stage being added
        stage: String,
        /// Missing dependency
        dependency: String,
    },
    /// Stage name already registered
    #[error("duplicate stage name '{0}'")]
    DuplicateStage(String),
    /// The process-wide stop flag tripped between stages
    #[error("cancelled")]
    Cancelled,
}

/// Executor result type
pub type Result<T> = std::result::Result<T, ExecutorError>;

// ============================================================================
// PROGRESS
// ============================================================================

/// A snapshot of batch execution state.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BatchProgress {
    /// Items submitted
    pub total: usize,
    /// Items finished successfully
    pub completed: usize,
    /// Items that exhausted their retries
    pub failed: usize,
    /// Items currently executing
    pub running: usize,
    /// Items not yet started
    pub pending: usize,
    /// Rolling throughput
    pub items_per_second: f64,
    /// Estimated seconds to completion at the current rate
    pub eta_seconds: Option<u64>,
}

/// Callback invoked on every tracker state change.
pub type ProgressCallback = Arc<dyn Fn(&BatchProgress) + Send + Sync>;

#[derive(Debug, Default)]
struct TrackerState {
    completed: usize,
    failed: usize,
    running: usize,
}

/// Thread-safe progress counter shared across pool workers.
pub struct ProgressTracker {
    total: usize,
    state: Mutex<TrackerState>,
    callback: Option<ProgressCallback>,
    started: Instant,
}

impl ProgressTracker {
    /// Tracker for `total` items.
    pub fn new(total: usize) -> Self {
        Self {
            total,
            state: Mutex::new(TrackerState::default()),
            callback: None,
            started: Instant::now(),
        }
    }

    /// Tracker that emits a snapshot to `callback` on every change.
    pub fn with_callback(total: usize, callback: ProgressCallback) -> Self {
        Self {
            callback: Some(callback),
            ..Self::new(total)
        }
    }

    /// Mark one item started.
    pub fn start_item(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.running += 1;
        }
        self.emit();
    }

    /// Mark one item finished.
    pub fn complete_item(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.running = state.running.saturating_sub(1);
            state.completed += 1;
        }
        self.emit();
    }

    /// Mark one item failed beyond retry.
    pub fn fail_item(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.running = state.running.saturating_sub(1);
            state.failed += 1;
        }
        self.emit();
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> BatchProgress {
        let (completed, failed, running) = match self.state.lock() {
            Ok(state) => (state.completed, state.failed, state.running),
            Err(_) => (0, 0, 0),
        };
        let done = completed + failed;
        let elapsed = self.started.elapsed().as_secs_f64();
        let items_per_second = if elapsed > 0.0 { done as f64 / elapsed } else { 0.0 };
        let remaining = self.total.saturating_sub(done + running);
        let eta_seconds = if items_per_second > 0.0 && done < self.total {
            Some(((self.total - done) as f64 / items_per_second) as u64)
        } else {
            None
        };

        BatchProgress {
            total: self.total,
            completed,
            failed,
            running,
            pending: remaining,
            items_per_second,
            eta_seconds,
        }
    }

    fn emit(&self) {
        if let Some(callback) = &self.callback {
            callback(&self.snapshot());
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_tracker_counts() {
        let tracker = ProgressTracker::new(3);
        tracker.start_item();
        tracker.start_item();
        tracker.complete_item();
        tracker.fail_item();

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.total, 3);
        assert_eq!(snapshot.completed, 1);
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.running, 0);
        assert_eq!(snapshot.pending, 1);
    }

    #[test]
    fn test_callback_fires_per_change() {
        let fires = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fires);
        let tracker = ProgressTracker::with_callback(
            2,
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        tracker.start_item();
        tracker.complete_item();
        assert_eq!(fires.load(Ordering::SeqCst), 2);
    }
}
