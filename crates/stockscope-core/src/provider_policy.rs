use std::time::Duration;

use crate::ProviderId;

/// Local request budget for one provider, matched to its free tier.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderPolicy {
    pub provider_id: ProviderId,
    pub quota_window: Duration,
    pub quota_limit: u32,
    /// Retry hint reported when the local budget is exhausted.
    pub retry_backoff: BackoffPolicy,
}

/// Exponential retry hint: `initial_delay * multiplier^n`, capped at
/// `max_delay`.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl BackoffPolicy {
    pub fn doubling(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay,
            multiplier: 2.0,
        }
    }
}

impl ProviderPolicy {
    /// `quota_limit` calls per minute. The first retry hint is the time one
    /// unit of budget takes to refill.
    pub fn per_minute(provider_id: ProviderId, quota_limit: u32) -> Self {
        let window = Duration::from_secs(60);
        let refill = window / quota_limit.max(1);
        Self {
            provider_id,
            quota_window: window,
            quota_limit,
            retry_backoff: BackoffPolicy::doubling(refill, window),
        }
    }

    pub fn with_retry_backoff(mut self, retry_backoff: BackoffPolicy) -> Self {
        self.retry_backoff = retry_backoff;
        self
    }

    pub fn default_for(provider_id: ProviderId) -> Self {
        match provider_id {
            ProviderId::Alphavantage | ProviderId::Polygon => Self::per_minute(provider_id, 5),
            ProviderId::Yahoo => Self::per_minute(provider_id, 60).with_retry_backoff(
                BackoffPolicy::doubling(Duration::from_secs(1), Duration::from_secs(30)),
            ),
        }
    }
}
