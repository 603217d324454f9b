//! Async Pool
//!
//! Cooperative concurrency bounded by a semaphore, for adapters that are
//! natively non-blocking. Suspension points are network I/O and timers
//! only; CPU work belongs on the CPU pool.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;

use super::ProgressTracker;

/// Semaphore-bounded async map executor.
pub struct AsyncPool {
    semaphore: Arc<Semaphore>,
    max_concurrency: usize,
}

impl AsyncPool {
    /// Pool allowing at most `max_concurrency` futures in flight.
    pub fn new(max_concurrency: usize) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
        }
    }

    /// Concurrency bound.
    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Order-preserving concurrent map. Failed items retry up to
    /// `max_retries` times, then are dropped and counted as failures.
    pub async fn map<T, R, E, F, Fut>(
        &self,
        f: F,
        items: Vec<T>,
        tracker: Option<&ProgressTracker>,
        max_retries: usize,
    ) -> Vec<R>
    where
        T: Clone,
        E: std::fmt::Display,
        F: Fn(T) -> Fut,
        Fut: Future<Output = std::result::Result<R, E>>,
    {
        let mut ordered: Vec<Option<R>> = Vec::with_capacity(items.len());
        let futures = items.into_iter().map(|item| {
            let semaphore = Arc::clone(&self.semaphore);
            let f = &f;
            async move {
                // Closing the semaphore is not part of this pool's API, so
                // acquire only fails if the runtime is tearing down
                let Ok(_permit) = semaphore.acquire().await else {
                    return None;
                };
                if let Some(tracker) = tracker {
                    tracker.start_item();
                }
                for attempt in 0..=max_retries {
                    match f(item.clone()).await {
                        Ok(result) => {
                            if let Some(tracker) = tracker {
                                tracker.complete_item();
                            }
                            return Some(result);
                        }
                        Err(e) => {
                            if attempt == max_retries {
                                tracing::debug!("async item dropped: {e}");
                            }
                        }
                    }
                }
                if let Some(tracker) = tracker {
                    tracker.fail_item();
                }
                None
            }
        });

        for result in futures::future::join_all(futures).await {
            ordered.push(result);
        }
        ordered.into_iter().flatten().collect()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_order_preserved() {
        let pool = AsyncPool::new(4);
        let items: Vec<u32> = (0..20).collect();
        let results = pool
            .map(|x| async move { Ok::<u32, String>(x * 10) }, items, None, 0)
            .await;
        assert_eq!(results.len(), 20);
        for (i, r) in results.iter().enumerate() {
            assert_eq!(*r, i as u32 * 10);
        }
    }

    #[tokio::test]
    async fn test_concurrency_bounded() {
        let pool = AsyncPool::new(2);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let items: Vec<u32> = (0..10).collect();
        let in_flight_ref = Arc::clone(&in_flight);
        let peak_ref = Arc::clone(&peak);
        let results = pool
            .map(
                move |x| {
                    let in_flight = Arc::clone(&in_flight_ref);
                    let peak = Arc::clone(&peak_ref);
                    async move {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        Ok::<u32, String>(x)
                    }
                },
                items,
                None,
                0,
            )
            .await;

        assert_eq!(results.len(), 10);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_failures_dropped_and_counted() {
        let pool = AsyncPool::new(4);
        let tracker = ProgressTracker::new(4);
        let items: Vec<u32> = (0..4).collect();
        let results = pool
            .map(
                |x| async move {
                    if x % 2 == 0 {
                        Err("even".to_string())
                    } else {
                        Ok(x)
                    }
                },
                items,
                Some(&tracker),
                1,
            )
            .await;

        assert_eq!(results, vec![1, 3]);
        assert_eq!(tracker.snapshot().failed, 2);
    }
}
