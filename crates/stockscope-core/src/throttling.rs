use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

use crate::provider_policy::{BackoffPolicy, ProviderPolicy};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Local request budget for one provider.
///
/// Requests over budget are refused immediately with a retry hint; the
/// resolver moves on to the next provider instead of waiting.
#[derive(Clone)]
pub struct ThrottlingQueue {
    limiter: Arc<DirectRateLimiter>,
    consecutive_rejections: Arc<AtomicU32>,
    backoff: BackoffPolicy,
}

impl ThrottlingQueue {
    pub fn new(quota_window: Duration, quota_limit: u32, backoff: BackoffPolicy) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::direct(quota_from_window(
                quota_window,
                quota_limit,
            ))),
            consecutive_rejections: Arc::new(AtomicU32::new(0)),
            backoff,
        }
    }

    pub fn from_policy(policy: &ProviderPolicy) -> Self {
        Self::new(
            policy.quota_window,
            policy.quota_limit,
            policy.retry_backoff.clone(),
        )
    }

    /// Take one unit of budget, or return how long the caller should back off.
    pub fn acquire(&self) -> Result<(), Duration> {
        if self.limiter.check().is_ok() {
            self.consecutive_rejections.store(0, Ordering::Relaxed);
            return Ok(());
        }

        let rejections = self.consecutive_rejections.fetch_add(1, Ordering::Relaxed);
        Err(self.retry_delay(rejections))
    }

    /// True while recent requests are being refused.
    pub fn is_saturated(&self) -> bool {
        self.consecutive_rejections.load(Ordering::Relaxed) > 0
    }

    pub fn retry_delay(&self, rejections: u32) -> Duration {
        let scale = self.backoff.multiplier.powf(f64::from(rejections));
        let seconds = self.backoff.initial_delay.as_secs_f64() * scale;
        Duration::from_secs_f64(seconds.min(self.backoff.max_delay.as_secs_f64()))
    }
}

fn quota_from_window(quota_window: Duration, quota_limit: u32) -> Quota {
    let burst = NonZeroU32::new(quota_limit).unwrap_or(NonZeroU32::MIN);
    let seconds_per_cell = (quota_window.as_secs_f64() / f64::from(burst.get())).max(0.001);

    Quota::with_period(Duration::from_secs_f64(seconds_per_cell))
        .unwrap_or_else(|| Quota::per_second(burst))
        .allow_burst(burst)
}
