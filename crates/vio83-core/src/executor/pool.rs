//! CPU and I/O Pools
//!
//! `CpuPool` targets extraction, NLP and distillation: rayon workers sized
//! to the physical cores minus one, leaving a core for the supervisor.
//! `ThreadPool` targets blocking I/O: oversubscribed OS threads with an
//! optional requests-per-second cap shared by all workers.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use rayon::prelude::*;

use super::ProgressTracker;

/// Run one item with retries, feeding the tracker.
fn run_item<T, R, E, F>(
    f: &F,
    item: &T,
    max_retries: usize,
    tracker: Option<&ProgressTracker>,
) -> Option<R>
where
    F: Fn(&T) -> std::result::Result<R, E>,
    E: std::fmt::Display,
{
    if let Some(tracker) = tracker {
        tracker.start_item();
    }
    for attempt in 0..=max_retries {
        match f(item) {
            Ok(result) => {
                if let Some(tracker) = tracker {
                    tracker.complete_item();
                }
                return Some(result);
            }
            Err(e) => {
                if attempt == max_retries {
                    tracing::debug!("item dropped after {} attempts: {e}", attempt + 1);
                } else {
                    tracing::trace!("item retry {}: {e}", attempt + 1);
                }
            }
        }
    }
    if let Some(tracker) = tracker {
        tracker.fail_item();
    }
    None
}

// ============================================================================
// CPU POOL
// ============================================================================

/// Rayon-backed pool for CPU-bound work.
pub struct CpuPool {
    pool: rayon::ThreadPool,
    workers: usize,
}

impl CpuPool {
    /// Pool with `max_workers` threads, default `max(2, physical_cpus - 1)`.
    pub fn new(max_workers: Option<usize>) -> Self {
        let workers = max_workers.unwrap_or_else(|| num_cpus::get_physical().saturating_sub(1).max(2));
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .unwrap_or_else(|_| {
                // Builder only fails when a global pool already claimed the
                // thread limit; fall back to a 2-thread local pool
                rayon::ThreadPoolBuilder::new()
                    .num_threads(2)
                    .build()
                    .expect("2-thread pool")
            });
        Self { pool, workers }
    }

    /// Worker count.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Order-preserving parallel map. Failed items retry up to
    /// `max_retries` times, then are dropped and counted as failures.
    pub fn map<T, R, E, F>(
        &self,
        f: F,
        items: &[T],
        tracker: Option<&ProgressTracker>,
        max_retries: usize,
    ) -> Vec<R>
    where
        T: Sync,
        R: Send,
        E: std::fmt::Display,
        F: Fn(&T) -> std::result::Result<R, E> + Send + Sync,
    {
        if items.is_empty() {
            return Vec::new();
        }
        let chunk = (items.len() / (self.workers * 4)).max(1);
        self.pool.install(|| {
            items
                .par_iter()
                .with_min_len(chunk)
                .map(|item| run_item(&f, item, max_retries, tracker))
                .collect::<Vec<Option<R>>>()
        })
        .into_iter()
        .flatten()
        .collect()
    }
}

// ============================================================================
// THREAD POOL
// ============================================================================

/// Simple blocking-interval limiter shared by the I/O workers.
struct SyncRateLimiter {
    min_interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl SyncRateLimiter {
    fn new(requests_per_second: f64) -> Self {
        Self {
            min_interval: Duration::from_secs_f64(1.0 / requests_per_second),
            last: Mutex::new(None),
        }
    }

    fn acquire(&self) {
        let wait = {
            let mut last = match self.last.lock() {
                Ok(guard) => guard,
                Err(_) => return,
            };
            let now = Instant::now();
            let wait = match *last {
                Some(previous) => (previous + self.min_interval).saturating_duration_since(now),
                None => Duration::ZERO,
            };
            *last = Some(now + wait);
            wait
        };
        if !wait.is_zero() {
            std::thread::sleep(wait);
        }
    }
}

/// OS-thread pool for I/O-bound work.
pub struct ThreadPool {
    workers: usize,
    limiter: Option<SyncRateLimiter>,
}

impl ThreadPool {
    /// Pool with `max_workers` threads, default `min(logical_cpus * 4, 64)`.
    pub fn new(max_workers: Option<usize>) -> Self {
        let workers = max_workers.unwrap_or_else(|| (num_cpus::get() * 4).min(64)).max(1);
        Self {
            workers,
            limiter: None,
        }
    }

    /// Cap the aggregate request rate across all workers.
    pub fn with_rate_limit(mut self, requests_per_second: f64) -> Self {
        if requests_per_second > 0.0 {
            self.limiter = Some(SyncRateLimiter::new(requests_per_second));
        }
        self
    }

    /// Worker count.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Order-preserving map over scoped worker threads.
    pub fn map<T, R, E, F>(
        &self,
        f: F,
        items: &[T],
        tracker: Option<&ProgressTracker>,
        max_retries: usize,
    ) -> Vec<R>
    where
        T: Sync,
        R: Send,
        E: std::fmt::Display,
        F: Fn(&T) -> std::result::Result<R, E> + Send + Sync,
    {
        if items.is_empty() {
            return Vec::new();
        }

        let (index_tx, index_rx) = crossbeam_channel::unbounded::<usize>();
        for index in 0..items.len() {
            let _ = index_tx.send(index);
        }
        drop(index_tx);

        let slots: Vec<Mutex<Option<R>>> = (0..items.len()).map(|_| Mutex::new(None)).collect();

        std::thread::scope(|scope| {
            for _ in 0..self.workers.min(items.len()) {
                let index_rx = index_rx.clone();
                let f = &f;
                let items = &items;
                let slots = &slots;
                let limiter = self.limiter.as_ref();
                scope.spawn(move || {
                    while let Ok(index) = index_rx.recv() {
                        if let Some(limiter) = limiter {
                            limiter.acquire();
                        }
                        let result = run_item(f, &items[index], max_retries, tracker);
                        if let Ok(mut slot) = slots[index].lock() {
                            *slot = result;
                        }
                    }
                });
            }
        });

        slots
            .into_iter()
            .filter_map(|slot| slot.into_inner().ok().flatten())
            .collect()
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
    fn test_cpu_pool_preserves_order() {
        let pool = CpuPool::new(Some(4));
        let items: Vec<u32> = (0..100).collect();
        let results = pool.map(
            |&x| Ok::<u32, String>(x * 2),
            &items,
            None,
            0,
        );
        assert_eq!(results.len(), 100);
        for (i, r) in results.iter().enumerate() {
            assert_eq!(*r, (i as u32) * 2);
        }
    }

    #[test]
    fn test_cpu_pool_drops_failures() {
        let pool = CpuPool::new(Some(2));
        let items: Vec<u32> = (0..10).collect();
        let tracker = ProgressTracker::new(items.len());
        let results = pool.map(
            |&x| {
                if x % 3 == 0 {
                    Err("divisible".to_string())
                } else {
                    Ok(x)
                }
            },
            &items,
            Some(&tracker),
            1,
        );
        // 0, 3, 6, 9 dropped
        assert_eq!(results, vec![1, 2, 4, 5, 7, 8]);
        assert_eq!(tracker.snapshot().failed, 4);
        assert_eq!(tracker.snapshot().completed, 6);
    }

    #[test]
    fn test_cpu_pool_retry_recovers() {
        let pool = CpuPool::new(Some(2));
        let attempts = AtomicUsize::new(0);
        let items = vec![1u32];
        let results = pool.map(
            |&x| {
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err("first try fails")
                } else {
                    Ok(x)
                }
            },
            &items,
            None,
            2,
        );
        assert_eq!(results, vec![1]);
    }

    #[test]
    fn test_thread_pool_order_and_default_sizing() {
        let pool = ThreadPool::new(None);
        assert!(pool.workers() <= 64);

        let items: Vec<u32> = (0..50).collect();
        let results = pool.map(|&x| Ok::<u32, String>(x + 1), &items, None, 0);
        assert_eq!(results.len(), 50);
        for (i, r) in results.iter().enumerate() {
            assert_eq!(*r, i as u32 + 1);
        }
    }

    #[test]
    fn test_thread_pool_rate_limit() {
        let pool = ThreadPool::new(Some(4)).with_rate_limit(100.0);
        let items: Vec<u32> = (0..5).collect();
        let started = Instant::now();
        let results = pool.map(|&x| Ok::<u32, String>(x), &items, None, 0);
        assert_eq!(results.len(), 5);
        // Four intervals of 10ms between five calls
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_default_cpu_sizing() {
        let pool = CpuPool::new(None);
        assert!(pool.workers() >= 2);
    }
}
