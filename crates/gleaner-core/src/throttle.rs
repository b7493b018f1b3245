//! Minimum inter-request spacing for polite fetching.
//!
//! One [`RateLimiter`] per job enforces at least `1/rate` seconds between
//! consecutive dispatches. It tracks only the last dispatch instant — no
//! queue. Callers issuing requests in parallel must serialize access to
//! [`RateLimiter::wait`] or own one limiter per logical lane; within a job
//! the fetch loop is strictly sequential, so a single shared instance is
//! enough.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Enforces a minimum interval between consecutive `wait()` returns.
#[derive(Clone)]
pub struct RateLimiter {
    min_delay: Duration,
    last_dispatch: Arc<Mutex<Option<Instant>>>,
}

impl RateLimiter {
    /// Limiter allowing `max_requests_per_second` dispatches per second.
    ///
    /// A non-positive rate disables spacing entirely.
    pub fn new(max_requests_per_second: f64) -> Self {
        let min_delay = if max_requests_per_second > 0.0 {
            Duration::from_secs_f64(1.0 / max_requests_per_second)
        } else {
            Duration::ZERO
        };
        Self {
            min_delay,
            last_dispatch: Arc::new(Mutex::new(None)),
        }
    }

    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    /// Block until at least `1/rate` seconds have passed since the previous
    /// call returned. The first call never blocks. Pure delay, no errors.
    pub async fn wait(&self) {
        let mut last = self.last_dispatch.lock().await;

        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_delay {
                let sleep_for = self.min_delay - elapsed;
                tracing::debug!(sleep_ms = %sleep_for.as_millis(), "Rate limit wait");
                tokio::time::sleep(sleep_for).await;
            }
        }

        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_call_returns_immediately() {
        let limiter = RateLimiter::new(1.0);
        let start = Instant::now();
        limiter.wait().await;
        assert!(
            start.elapsed() < Duration::from_millis(50),
            "first wait should not block, took {:?}",
            start.elapsed()
        );
    }

    #[tokio::test]
    async fn consecutive_calls_are_spaced() {
        // 10 req/s → 100ms spacing.
        let limiter = RateLimiter::new(10.0);
        limiter.wait().await;
        let start = Instant::now();
        limiter.wait().await;
        assert!(
            start.elapsed() >= Duration::from_millis(90),
            "second wait should be delayed, elapsed {:?}",
            start.elapsed()
        );
    }

    #[tokio::test]
    async fn elapsed_time_counts_against_the_delay() {
        let limiter = RateLimiter::new(10.0);
        limiter.wait().await;
        tokio::time::sleep(Duration::from_millis(120)).await;
        let start = Instant::now();
        limiter.wait().await;
        assert!(
            start.elapsed() < Duration::from_millis(50),
            "delay already elapsed, wait should be immediate"
        );
    }

    #[test]
    fn non_positive_rate_disables_spacing() {
        assert_eq!(RateLimiter::new(0.0).min_delay(), Duration::ZERO);
        assert_eq!(RateLimiter::new(-1.0).min_delay(), Duration::ZERO);
    }
}
