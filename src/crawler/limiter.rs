//! Process-wide token bucket
//!
//! One [`RateLimiter`] is shared by every fetch of a crawl run, including
//! retries and comment continuations, so the outbound request rate is bounded
//! no matter how many posts are in flight.

use crate::config::RateLimitConfig;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Token/timestamp pair guarded by the limiter's mutex
#[derive(Debug)]
struct BucketState {
    tokens: u32,
    last_refill: Instant,
}

/// Token bucket with fixed post-acquire spacing
///
/// Waiters poll rather than queue, so there is no ordering guarantee among
/// concurrent callers.
#[derive(Debug)]
pub struct RateLimiter {
    state: Mutex<BucketState>,
    capacity: u32,
    refill_interval: Duration,
    spacing: Duration,
    poll_interval: Duration,
}

impl RateLimiter {
    /// Creates a full bucket
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum tokens, restored on every refill
    /// * `refill_interval` - Time after the last refill at which the bucket refills
    /// * `spacing` - Delay applied after each granted token
    /// * `poll_interval` - Sleep between checks while the bucket is empty
    pub fn new(
        capacity: u32,
        refill_interval: Duration,
        spacing: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
            capacity,
            refill_interval,
            spacing,
            poll_interval,
        }
    }

    /// Creates a limiter from the `[rate-limit]` configuration section
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(
            config.capacity,
            Duration::from_millis(config.refill_interval),
            Duration::from_millis(config.request_spacing),
            Duration::from_millis(config.poll_interval),
        )
    }

    /// Waits until a token is available and consumes it
    ///
    /// The mutex is held only for the token arithmetic; the spacing delay and
    /// the empty-bucket poll sleep both happen after it is released.
    pub async fn acquire(&self) {
        loop {
            if self.try_take().await {
                if !self.spacing.is_zero() {
                    tokio::time::sleep(self.spacing).await;
                }
                return;
            }

            tracing::trace!(poll_ms = self.poll_interval.as_millis() as u64, "Token bucket empty");
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Refills if due, then takes a token if one is left
    async fn try_take(&self) -> bool {
        let mut state = self.state.lock().await;
        let now = Instant::now();

        if now.duration_since(state.last_refill) >= self.refill_interval {
            state.tokens = self.capacity;
            state.last_refill = now;
        }

        if state.tokens > 0 {
            state.tokens -= 1;
            true
        } else {
            false
        }
    }

    /// Tokens currently left in the bucket (without refilling)
    pub async fn available(&self) -> u32 {
        self.state.lock().await.tokens
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}
