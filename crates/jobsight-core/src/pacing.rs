//! Fixed-rate pacing shared by crawl pages and backfill writes.
//!
//! A [`Pacer`] hands out one permit per configured period using a governor
//! token bucket with a burst of one, so consecutive permits are at least one
//! period apart no matter how many callers share it. A zero period disables
//! pacing entirely.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{Quota, RateLimiter};

type DirectRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Shared fixed-period limiter. Cloning shares the bucket.
#[derive(Clone)]
pub struct Pacer {
    period: Duration,
    limiter: Option<Arc<DirectRateLimiter>>,
}

impl Pacer {
    /// Pacer allowing one permit per `period`.
    pub fn new(period: Duration) -> Self {
        let limiter = Quota::with_period(period)
            .map(|quota| quota.allow_burst(NonZeroU32::MIN))
            .map(|quota| Arc::new(RateLimiter::direct(quota)));
        Self { period, limiter }
    }

    /// Pacer from a millisecond period, as read from configuration.
    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    /// Pacer that never waits.
    pub fn unlimited() -> Self {
        Self {
            period: Duration::ZERO,
            limiter: None,
        }
    }

    /// Configured spacing between permits.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Wait until the next permit is available.
    pub async fn acquire(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}

impl std::fmt::Debug for Pacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pacer").field("period", &self.period).finish()
    }
}
