//! Rate Limiting
//!
//! A per-client leaky bucket: calls sleep until the minimum interval since
//! the previous request has elapsed. The scholarly APIs reward politeness;
//! the polite-pool contract is enforced here rather than hoped for.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Leaky-bucket limiter enforcing `requests_per_second`.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Limiter allowing `requests_per_second` (values <= 0 disable it).
    pub fn new(requests_per_second: f64) -> Self {
        let min_interval = if requests_per_second > 0.0 {
            Duration::from_secs_f64(1.0 / requests_per_second)
        } else {
            Duration::ZERO
        };
        Self {
            min_interval,
            last: Mutex::new(None),
        }
    }

    /// Sleep as needed, then mark this request's slot.
    pub async fn acquire(&self) {
        if self.min_interval.is_zero() {
            return;
        }

        let mut last = self.last.lock().await;
        let now = Instant::now();
        if let Some(previous) = *last {
            let next_allowed = previous + self.min_interval;
            if next_allowed > now {
                tokio::time::sleep(next_allowed - now).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_enforces_interval() {
        let limiter = RateLimiter::new(50.0); // 20ms interval
        let started = Instant::now();
        for _ in 0..3 {
            limiter.acquire().await;
        }
        // Two full intervals between three calls
        assert!(started.elapsed() >= Duration::from_millis(35));
    }

    #[tokio::test]
    async fn test_zero_rate_disables() {
        let limiter = RateLimiter::new(0.0);
        let started = Instant::now();
        for _ in 0..10 {
            limiter.acquire().await;
        }
        assert!(started.elapsed() < Duration::from_millis(20));
    }
}
