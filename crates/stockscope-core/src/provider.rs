//! Provider adapter contract.
//!
//! Every upstream data source sits behind [`ProviderAdapter`]. A fetch always
//! ends in exactly one [`ProviderResult`] variant; transport failures, HTTP
//! statuses and provider-specific error payloads are classified inside the
//! adapter and never escape as raw errors.
//!
//! | Dataset | Payload |
//! |---------|---------|
//! | `quote` | [`Quote`] |
//! | `overview` | [`Overview`] |
//! | `history` | [`HistoricalSeries`] |
//! | `news` | `Vec<NewsItem>` |

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::enrichment::{merge_overview, EnrichmentRecord};
use crate::{DatasetKind, DateRange, HistoricalSeries, NewsItem, Overview, ProviderId, Quote, Symbol};

/// Datasets a provider can serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    pub quote: bool,
    pub overview: bool,
    pub history: bool,
    pub news: bool,
}

impl CapabilitySet {
    pub const fn new(quote: bool, overview: bool, history: bool, news: bool) -> Self {
        Self {
            quote,
            overview,
            history,
            news,
        }
    }

    pub const fn full() -> Self {
        Self::new(true, true, true, true)
    }

    /// `indicators` is derived locally and never supported by a provider.
    pub const fn supports(self, dataset: DatasetKind) -> bool {
        match dataset {
            DatasetKind::Quote => self.quote,
            DatasetKind::Overview => self.overview,
            DatasetKind::History => self.history,
            DatasetKind::News => self.news,
            DatasetKind::Indicators => false,
        }
    }

    pub fn supported_datasets(self) -> Vec<&'static str> {
        [
            DatasetKind::Quote,
            DatasetKind::Overview,
            DatasetKind::History,
            DatasetKind::News,
        ]
        .into_iter()
        .filter(|dataset| self.supports(*dataset))
        .map(DatasetKind::as_str)
        .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Runtime provider health, reported by `sources`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub state: HealthState,
    pub rate_available: bool,
}

impl HealthStatus {
    pub const fn new(state: HealthState, rate_available: bool) -> Self {
        Self {
            state,
            rate_available,
        }
    }

    pub const fn healthy() -> Self {
        Self::new(HealthState::Healthy, true)
    }

    pub const fn status_label(self) -> &'static str {
        if !self.rate_available {
            return "rate_limited";
        }
        match self.state {
            HealthState::Healthy => "healthy",
            HealthState::Degraded => "degraded",
            HealthState::Unhealthy => "unhealthy",
        }
    }
}

/// One provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub symbol: Symbol,
    pub dataset: DatasetKind,
    /// Only meaningful for `history`.
    pub range: Option<DateRange>,
}

impl FetchRequest {
    pub fn new(symbol: Symbol, dataset: DatasetKind) -> Self {
        Self {
            symbol,
            dataset,
            range: None,
        }
    }

    pub fn with_range(mut self, range: DateRange) -> Self {
        self.range = Some(range);
        self
    }
}

/// Normalized data returned by a successful fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderPayload {
    Quote(Quote),
    Overview(Overview),
    History(HistoricalSeries),
    News(Vec<NewsItem>),
}

impl ProviderPayload {
    pub const fn dataset(&self) -> DatasetKind {
        match self {
            Self::Quote(_) => DatasetKind::Quote,
            Self::Overview(_) => DatasetKind::Overview,
            Self::History(_) => DatasetKind::History,
            Self::News(_) => DatasetKind::News,
        }
    }
}

/// Terminal outcome of a single provider call.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderResult<T> {
    Success(T),
    NotFound,
    /// Optional hint of when the provider will accept requests again.
    RateLimited(Option<Duration>),
    TransientError(String),
}

impl<T> ProviderResult<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ProviderResult<U> {
        match self {
            Self::Success(value) => ProviderResult::Success(f(value)),
            Self::NotFound => ProviderResult::NotFound,
            Self::RateLimited(retry) => ProviderResult::RateLimited(retry),
            Self::TransientError(detail) => ProviderResult::TransientError(detail),
        }
    }

    /// Chain a step that can itself fail, such as normalizing a response body.
    pub fn and_then<U>(self, f: impl FnOnce(T) -> ProviderResult<U>) -> ProviderResult<U> {
        match self {
            Self::Success(value) => f(value),
            Self::NotFound => ProviderResult::NotFound,
            Self::RateLimited(retry) => ProviderResult::RateLimited(retry),
            Self::TransientError(detail) => ProviderResult::TransientError(detail),
        }
    }

    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub const fn outcome(&self) -> AttemptOutcome {
        match self {
            Self::Success(_) => AttemptOutcome::Success,
            Self::NotFound => AttemptOutcome::NotFound,
            Self::RateLimited(_) => AttemptOutcome::RateLimited,
            Self::TransientError(_) => AttemptOutcome::TransientError,
        }
    }
}

/// Outcome label recorded per provider attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    NotFound,
    RateLimited,
    TransientError,
}

impl Display for AttemptOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Success => "success",
            Self::NotFound => "not_found",
            Self::RateLimited => "rate_limited",
            Self::TransientError => "transient_error",
        })
    }
}

/// Upstream data source contract.
///
/// Implementations must be `Send + Sync`; one instance serves every request
/// of the process.
pub trait ProviderAdapter: Send + Sync {
    fn id(&self) -> ProviderId;

    fn capabilities(&self) -> CapabilitySet;

    /// Fetch and normalize one dataset for one symbol.
    fn fetch<'a>(
        &'a self,
        request: FetchRequest,
    ) -> Pin<Box<dyn Future<Output = ProviderResult<ProviderPayload>> + Send + 'a>>;

    fn health<'a>(&'a self) -> Pin<Box<dyn Future<Output = HealthStatus> + Send + 'a>> {
        Box::pin(async { HealthStatus::healthy() })
    }
}

/// A dataset the resolver can fetch, cache and type-check.
pub trait Dataset: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: DatasetKind;

    /// Extract this dataset from a provider payload; `None` on a mismatch.
    fn from_payload(payload: ProviderPayload) -> Option<Self>;

    /// Apply enrichment to a freshly fetched value.
    fn enrich(&mut self, _record: &EnrichmentRecord) {}

    fn wants_enrichment() -> bool {
        false
    }
}

impl Dataset for Quote {
    const KIND: DatasetKind = DatasetKind::Quote;

    fn from_payload(payload: ProviderPayload) -> Option<Self> {
        match payload {
            ProviderPayload::Quote(quote) => Some(quote),
            _ => None,
        }
    }
}

impl Dataset for Overview {
    const KIND: DatasetKind = DatasetKind::Overview;

    fn from_payload(payload: ProviderPayload) -> Option<Self> {
        match payload {
            ProviderPayload::Overview(overview) => Some(overview),
            _ => None,
        }
    }

    fn enrich(&mut self, record: &EnrichmentRecord) {
        let filled = merge_overview(self, record);
        self.enriched_fields
            .extend(filled.into_iter().map(str::to_owned));
    }

    fn wants_enrichment() -> bool {
        true
    }
}

impl Dataset for HistoricalSeries {
    const KIND: DatasetKind = DatasetKind::History;

    fn from_payload(payload: ProviderPayload) -> Option<Self> {
        match payload {
            ProviderPayload::History(series) => Some(series),
            _ => None,
        }
    }
}

impl Dataset for Vec<NewsItem> {
    const KIND: DatasetKind = DatasetKind::News;

    fn from_payload(payload: ProviderPayload) -> Option<Self> {
        match payload {
            ProviderPayload::News(items) => Some(items),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capabilities_never_claim_indicators() {
        let full = CapabilitySet::full();
        assert!(full.supports(DatasetKind::History));
        assert!(!full.supports(DatasetKind::Indicators));
        assert_eq!(
            CapabilitySet::new(true, false, true, false).supported_datasets(),
            vec!["quote", "history"]
        );
    }

    #[test]
    fn map_preserves_failure_variants() {
        let limited: ProviderResult<u8> = ProviderResult::RateLimited(Some(Duration::from_secs(3)));
        assert_eq!(
            limited.map(u16::from),
            ProviderResult::RateLimited(Some(Duration::from_secs(3)))
        );
        assert_eq!(
            ProviderResult::Success(2_u8).map(u16::from),
            ProviderResult::Success(2_u16)
        );
    }
}
