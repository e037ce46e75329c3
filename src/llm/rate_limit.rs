//! Per-provider token bucket

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tracing::debug;

/// Bucket dimensions for one provider
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateLimit {
    /// Maximum burst size
    pub capacity: u32,
    /// Tokens added per second
    pub refill_per_second: f64,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            capacity: 5,
            refill_per_second: 1.0,
        }
    }
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket with lazy refill on a monotonic clock.
///
/// `acquire` holds the bucket lock while it waits for the next token, so
/// waiters are served in the order they queued on the lock.
#[derive(Debug)]
pub struct RateLimiter {
    capacity: f64,
    refill_per_second: f64,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// A capacity below 1 or a non-positive refill rate is raised to the
    /// smallest workable value.
    pub fn new(limit: RateLimit) -> Self {
        let capacity = f64::from(limit.capacity.max(1));
        let refill_per_second = if limit.refill_per_second > 0.0 {
            limit.refill_per_second
        } else {
            1e-6
        };

        Self {
            capacity,
            refill_per_second,
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    fn refill(&self, bucket: &mut Bucket, now: Instant) {
        let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_per_second).min(self.capacity);
        bucket.last_refill = now;
    }

    /// Waits until a token is available, then takes it
    pub async fn acquire(&self) {
        let mut bucket = self.bucket.lock().await;
        loop {
            self.refill(&mut bucket, Instant::now());
            if bucket.tokens >= 1.0 {
                bucket.tokens -= 1.0;
                return;
            }

            let deficit = 1.0 - bucket.tokens;
            let wait = Duration::from_secs_f64(deficit / self.refill_per_second);
            debug!("Rate limiting: waiting {:?}", wait);
            tokio::time::sleep(wait).await;
        }
    }

    /// Takes a token if one is available right now
    pub fn try_acquire(&self) -> bool {
        let Ok(mut bucket) = self.bucket.try_lock() else {
            return false;
        };
        self.refill(&mut bucket, Instant::now());
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Tokens currently in the bucket (fractional)
    pub async fn available(&self) -> f64 {
        let mut bucket = self.bucket.lock().await;
        self.refill(&mut bucket, Instant::now());
        bucket.tokens
    }

    pub fn capacity(&self) -> u32 {
        self.capacity as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn limiter(capacity: u32, refill_per_second: f64) -> RateLimiter {
        RateLimiter::new(RateLimit {
            capacity,
            refill_per_second,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_then_throttle() {
        let limiter = limiter(3, 1.0);
        let start = Instant::now();

        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);

        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(1));
        assert!(start.elapsed() < Duration::from_millis(1100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_try_acquire() {
        let limiter = limiter(1, 2.0);

        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());

        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(limiter.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_is_capped() {
        let limiter = limiter(2, 10.0);
        limiter.acquire().await;

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(limiter.available().await, 2.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_bound_under_contention() {
        let limiter = Arc::new(limiter(2, 1.0));
        let start = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..6 {
            let l = limiter.clone();
            handles.push(tokio::spawn(async move {
                l.acquire().await;
                Instant::now()
            }));
        }

        let mut granted = Vec::new();
        for h in handles {
            granted.push(h.await.unwrap());
        }

        // capacity + rate * window
        let window = Duration::from_secs(2);
        let within = granted
            .iter()
            .filter(|t| t.duration_since(start) <= window)
            .count();
        assert!(within <= 2 + 2, "{} tokens granted within {:?}", within, window);
        assert_eq!(granted.len(), 6);
    }

    #[test]
    fn test_degenerate_limits_are_raised() {
        let limiter = limiter(0, 0.0);
        assert_eq!(limiter.capacity(), 1);
    }
}
