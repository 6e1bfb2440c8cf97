//! Token-bucket throttle shared by every outbound generation request.
//!
//! The bucket holds up to `capacity` tokens and refills continuously at
//! `capacity` tokens per minute. An idle bucket allows a burst of
//! `capacity` requests; sustained throughput is capped at `capacity` per
//! 60 seconds.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

const WINDOW_SECS: f64 = 60.0;

/// Requests-per-minute token bucket
#[derive(Debug)]
pub struct RateLimiter {
    /// Tokens granted per 60-second window
    capacity: u32,

    /// Mutable token state; held only for the refill computation
    bucket: Mutex<Bucket>,
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    /// Add tokens earned since the last refill, capped at `capacity`
    fn refill(&mut self, capacity: u32, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        let earned = elapsed * f64::from(capacity) / WINDOW_SECS;
        self.tokens = (self.tokens + earned).min(f64::from(capacity));
        self.last_refill = now;
    }
}

impl RateLimiter {
    /// Create a full bucket. A capacity of zero is treated as one.
    pub fn new(requests_per_minute: u32) -> Self {
        let capacity = requests_per_minute.max(1);
        Self {
            capacity,
            bucket: Mutex::new(Bucket {
                tokens: f64::from(capacity),
                last_refill: Instant::now(),
            }),
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Time between token grants at the sustained rate
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(WINDOW_SECS / f64::from(self.capacity))
    }

    /// Wait until a token is available, then consume it
    pub async fn acquire(&self) {
        loop {
            {
                let mut bucket = self.bucket.lock().await;
                bucket.refill(self.capacity, Instant::now());

                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    return;
                }
            }

            debug!(
                wait_ms = self.interval().as_millis() as u64,
                "Rate limit reached, waiting for token"
            );
            tokio::time::sleep(self.interval()).await;
        }
    }

    /// Tokens currently available (after refill)
    pub async fn available(&self) -> f64 {
        let mut bucket = self.bucket.lock().await;
        bucket.refill(self.capacity, Instant::now());
        bucket.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_capacity_is_clamped() {
        let limiter = RateLimiter::new(0);
        assert_eq!(limiter.capacity(), 1);
        assert_eq!(limiter.interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_interval() {
        assert_eq!(RateLimiter::new(12).interval(), Duration::from_secs(5));
        assert_eq!(RateLimiter::new(2).interval(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_is_continuous_and_capped() {
        let limiter = RateLimiter::new(6);
        for _ in 0..6 {
            limiter.acquire().await;
        }
        assert!(limiter.available().await < 1.0);

        // 6 per minute = one token every 10s; 15s earns 1.5 tokens
        tokio::time::advance(Duration::from_secs(15)).await;
        let available = limiter.available().await;
        assert!((available - 1.5).abs() < 1e-9, "available = {}", available);

        // Long idle never exceeds capacity
        tokio::time::advance(Duration::from_secs(600)).await;
        assert_eq!(limiter.available().await, 6.0);
    }
}
