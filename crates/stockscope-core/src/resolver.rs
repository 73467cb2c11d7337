//! Provider-fallback resolution.
//!
//! ```text
//! cache hit ──────────────────────────────────────────────► Hit
//! cache miss ─► provider[0] ─► provider[1] ─► ... ─► Success ─► enrich ─► write cache ─► Miss
//!                     │               │
//!                     └── NotFound / RateLimited / TransientError: next provider
//! chain exhausted ─► error of the last attempt (or stale entry when enabled)
//! ```
//!
//! Providers are tried strictly in order, at most once each, never
//! concurrently. The continue/stop decision is [`next_step`].

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::{CacheKey, CacheStore};
use crate::enrichment::{EnrichmentSource, NoopEnrichment};
use crate::provider::{
    AttemptOutcome, CapabilitySet, Dataset, FetchRequest, HealthState, HealthStatus,
    ProviderAdapter, ProviderResult,
};
use crate::{CacheStatus, ProviderId, ResolveError, Symbol};

pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

/// What the chain does after one provider answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    StopSuccess,
    StopError,
}

/// `remaining` counts the providers left after the one that produced `result`.
pub fn next_step<T>(result: &ProviderResult<T>, remaining: usize) -> Step {
    match result {
        ProviderResult::Success(_) => Step::StopSuccess,
        ProviderResult::NotFound
        | ProviderResult::RateLimited(_)
        | ProviderResult::TransientError(_) => {
            if remaining > 0 {
                Step::Continue
            } else {
                Step::StopError
            }
        }
    }
}

/// One provider call made while resolving a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderAttempt {
    pub provider: ProviderId,
    pub outcome: AttemptOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// A dataset together with how it was obtained.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolved<T> {
    pub data: T,
    /// Provider that produced `data`, remembered across cache hits.
    pub provenance: ProviderId,
    /// Providers called for this request, in order. Empty on a cache hit.
    pub source_chain: Vec<ProviderId>,
    pub cache: CacheStatus,
    pub attempts: Vec<ProviderAttempt>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedRecord<T> {
    provider: ProviderId,
    data: T,
}

/// Provider status reported by `sources`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SourceSnapshot {
    pub id: ProviderId,
    pub capabilities: CapabilitySet,
    pub health: HealthStatus,
}

impl SourceSnapshot {
    pub fn available(self) -> bool {
        self.health.state != HealthState::Unhealthy
    }

    pub fn status_label(self) -> &'static str {
        self.health.status_label()
    }
}

/// Ordered adapter chain in front of the cache.
pub struct Resolver {
    adapters: Vec<Arc<dyn ProviderAdapter>>,
    cache: CacheStore,
    enrichment: Arc<dyn EnrichmentSource>,
    provider_timeout: Duration,
    serve_stale: bool,
}

impl Resolver {
    /// `adapters` are tried in the given order.
    pub fn new(adapters: Vec<Arc<dyn ProviderAdapter>>, cache: CacheStore) -> Self {
        Self {
            adapters,
            cache,
            enrichment: Arc::new(NoopEnrichment),
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
            serve_stale: false,
        }
    }

    pub fn with_enrichment(mut self, enrichment: Arc<dyn EnrichmentSource>) -> Self {
        self.enrichment = enrichment;
        self
    }

    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    /// Serve an expired entry when every provider fails for a reason other
    /// than `NotFound`.
    pub fn with_serve_stale(mut self, serve_stale: bool) -> Self {
        self.serve_stale = serve_stale;
        self
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Configured provider order.
    pub fn provider_order(&self) -> Vec<ProviderId> {
        self.adapters.iter().map(|adapter| adapter.id()).collect()
    }

    pub async fn sources(&self) -> Vec<SourceSnapshot> {
        let mut snapshots = Vec::with_capacity(self.adapters.len());
        for adapter in &self.adapters {
            snapshots.push(SourceSnapshot {
                id: adapter.id(),
                capabilities: adapter.capabilities(),
                health: adapter.health().await,
            });
        }
        snapshots
    }

    /// Resolve dataset `T` for `symbol`.
    pub async fn resolve<T: Dataset>(&self, symbol: &Symbol) -> Result<Resolved<T>, ResolveError> {
        let dataset = T::KIND;
        let key = CacheKey::new(symbol.clone(), dataset);

        if let Some(cached) = self.cache.get_json::<CachedRecord<T>>(&key).await? {
            debug!(%symbol, %dataset, provider = %cached.provider, "resolved from cache");
            return Ok(Resolved {
                data: cached.data,
                provenance: cached.provider,
                source_chain: Vec::new(),
                cache: CacheStatus::Hit,
                attempts: Vec::new(),
            });
        }

        let chain: Vec<&Arc<dyn ProviderAdapter>> = self
            .adapters
            .iter()
            .filter(|adapter| adapter.capabilities().supports(dataset))
            .collect();
        if chain.is_empty() {
            return Err(ResolveError::Configuration { dataset });
        }

        let request = FetchRequest::new(symbol.clone(), dataset);
        let mut source_chain = Vec::with_capacity(chain.len());
        let mut attempts = Vec::with_capacity(chain.len());
        let mut last = ProviderResult::TransientError(String::from("no provider attempted"));

        for (index, adapter) in chain.iter().enumerate() {
            let provider = adapter.id();
            source_chain.push(provider);

            let result = self.call::<T>(adapter.as_ref(), request.clone()).await;
            debug!(%symbol, %dataset, %provider, outcome = %result.outcome(), "provider attempt");
            attempts.push(ProviderAttempt {
                provider,
                outcome: result.outcome(),
                detail: match &result {
                    ProviderResult::TransientError(detail) => Some(detail.clone()),
                    _ => None,
                },
            });

            match next_step(&result, chain.len() - index - 1) {
                Step::StopSuccess => {
                    let ProviderResult::Success(mut data) = result else {
                        break;
                    };
                    if attempts.len() > 1 {
                        info!(%symbol, %dataset, %provider, failed = attempts.len() - 1, "provider fallback succeeded");
                    }
                    if T::wants_enrichment() {
                        let record = self.enrichment.fetch(symbol).await;
                        data.enrich(&record);
                    }
                    self.write_back(&key, provider, &data).await;
                    return Ok(Resolved {
                        data,
                        provenance: provider,
                        source_chain,
                        cache: CacheStatus::Miss,
                        attempts,
                    });
                }
                Step::Continue => last = result,
                Step::StopError => {
                    last = result;
                    break;
                }
            }
        }

        let error = chain_error(symbol, dataset, last);
        warn!(%symbol, %dataset, code = error.code(), "provider chain exhausted");

        if self.serve_stale && !matches!(error, ResolveError::NotFound { .. }) {
            if let Some((cached, age)) = self.cache.get_stale_json::<CachedRecord<T>>(&key).await? {
                warn!(%symbol, %dataset, age_secs = age.as_secs(), "serving stale cache entry");
                return Ok(Resolved {
                    data: cached.data,
                    provenance: cached.provider,
                    source_chain,
                    cache: CacheStatus::Stale,
                    attempts,
                });
            }
        }

        Err(error)
    }

    async fn call<T: Dataset>(
        &self,
        adapter: &dyn ProviderAdapter,
        request: FetchRequest,
    ) -> ProviderResult<T> {
        let provider = adapter.id();
        match tokio::time::timeout(self.provider_timeout, adapter.fetch(request)).await {
            Ok(result) => result.and_then(|payload| match T::from_payload(payload) {
                Some(data) => ProviderResult::Success(data),
                None => ProviderResult::TransientError(format!(
                    "{provider} returned a payload other than {}",
                    T::KIND
                )),
            }),
            Err(_) => ProviderResult::TransientError(format!(
                "{provider} did not answer within {}ms",
                self.provider_timeout.as_millis()
            )),
        }
    }

    async fn write_back<T: Dataset>(&self, key: &CacheKey, provider: ProviderId, data: &T) {
        let record = CachedRecord { provider, data };
        if let Err(error) = self.cache.set_json(key, &record).await {
            warn!(key = %key, %error, "cache write failed; result returned uncached");
        }
    }
}

fn chain_error<T>(
    symbol: &Symbol,
    dataset: crate::DatasetKind,
    last: ProviderResult<T>,
) -> ResolveError {
    let symbol = symbol.clone();
    match last {
        ProviderResult::NotFound => ResolveError::NotFound { symbol, dataset },
        ProviderResult::RateLimited(retry_after) => ResolveError::RateLimited {
            symbol,
            dataset,
            retry_after,
        },
        ProviderResult::TransientError(detail) => ResolveError::UpstreamUnavailable {
            symbol,
            dataset,
            detail,
        },
        ProviderResult::Success(_) => ResolveError::UpstreamUnavailable {
            symbol,
            dataset,
            detail: String::from("provider chain ended without a result"),
        },
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedAdapter;
    use super::*;
    use crate::cache::CacheTtls;
    use crate::enrichment::{EnrichmentRecord, StaticEnrichment};
    use crate::provider::ProviderPayload;
    use crate::{Overview, Quote, UtcDateTime};

    fn symbol() -> Symbol {
        Symbol::parse("AAPL").expect("valid symbol")
    }

    fn quote_payload(price: f64) -> ProviderResult<ProviderPayload> {
        let quote = Quote::new(symbol(), price, None, None, None, UtcDateTime::now())
            .expect("valid quote");
        ProviderResult::Success(ProviderPayload::Quote(quote))
    }

    fn resolver(adapters: Vec<Arc<ScriptedAdapter>>, cache: CacheStore) -> Resolver {
        Resolver::new(
            adapters
                .into_iter()
                .map(|adapter| adapter as Arc<dyn ProviderAdapter>)
                .collect(),
            cache,
        )
    }

    #[test]
    fn next_step_stops_on_success_and_on_exhaustion() {
        assert_eq!(next_step(&ProviderResult::Success(()), 2), Step::StopSuccess);
        assert_eq!(next_step(&ProviderResult::Success(()), 0), Step::StopSuccess);
        assert_eq!(next_step::<()>(&ProviderResult::NotFound, 1), Step::Continue);
        assert_eq!(next_step::<()>(&ProviderResult::RateLimited(None), 1), Step::Continue);
        assert_eq!(
            next_step::<()>(&ProviderResult::TransientError(String::from("x")), 0),
            Step::StopError
        );
        assert_eq!(next_step::<()>(&ProviderResult::NotFound, 0), Step::StopError);
    }

    #[tokio::test]
    async fn falls_back_after_rate_limit() {
        let primary = Arc::new(ScriptedAdapter::new(
            ProviderId::Alphavantage,
            vec![ProviderResult::RateLimited(None)],
        ));
        let secondary = Arc::new(ScriptedAdapter::new(ProviderId::Yahoo, vec![quote_payload(101.0)]));
        let resolver = resolver(
            vec![primary.clone(), secondary.clone()],
            CacheStore::in_memory(CacheTtls::default()),
        );

        let resolved = resolver.resolve::<Quote>(&symbol()).await.expect("resolved");

        assert_eq!(resolved.provenance, ProviderId::Yahoo);
        assert_eq!(resolved.source_chain, vec![ProviderId::Alphavantage, ProviderId::Yahoo]);
        assert_eq!(resolved.attempts[0].outcome, AttemptOutcome::RateLimited);
        assert_eq!((primary.calls(), secondary.calls()), (1, 1));
    }

    #[tokio::test]
    async fn cache_hit_skips_providers_and_keeps_provenance() {
        let adapter = Arc::new(ScriptedAdapter::new(ProviderId::Polygon, vec![quote_payload(50.0)]));
        let resolver = resolver(vec![adapter.clone()], CacheStore::in_memory(CacheTtls::default()));

        let first = resolver.resolve::<Quote>(&symbol()).await.expect("first");
        let second = resolver.resolve::<Quote>(&symbol()).await.expect("second");

        assert_eq!(first.data, second.data);
        assert_eq!(second.cache, CacheStatus::Hit);
        assert_eq!(second.provenance, ProviderId::Polygon);
        assert_eq!(adapter.calls(), 1);
    }

    #[tokio::test]
    async fn last_error_decides_the_failure() {
        let adapters = vec![
            Arc::new(ScriptedAdapter::new(ProviderId::Alphavantage, vec![ProviderResult::NotFound])),
            Arc::new(ScriptedAdapter::new(
                ProviderId::Yahoo,
                vec![ProviderResult::TransientError(String::from("boom"))],
            )),
        ];
        let resolver = resolver(adapters, CacheStore::in_memory(CacheTtls::default()));

        let error = resolver.resolve::<Quote>(&symbol()).await.expect_err("must fail");
        assert!(matches!(error, ResolveError::UpstreamUnavailable { ref detail, .. } if detail == "boom"));
    }

    #[tokio::test]
    async fn unsupported_dataset_is_a_configuration_error() {
        let adapter = Arc::new(
            ScriptedAdapter::new(ProviderId::Yahoo, vec![quote_payload(1.0)])
                .with_capabilities(CapabilitySet::new(true, false, true, false)),
        );
        let resolver = resolver(vec![adapter.clone()], CacheStore::in_memory(CacheTtls::default()));

        let error = resolver.resolve::<Overview>(&symbol()).await.expect_err("must fail");
        assert!(matches!(error, ResolveError::Configuration { .. }));
        assert_eq!(adapter.calls(), 0);
    }

    #[tokio::test]
    async fn slow_provider_times_out_and_chain_advances() {
        let slow = Arc::new(
            ScriptedAdapter::new(ProviderId::Alphavantage, vec![quote_payload(1.0)])
                .with_delay(Duration::from_millis(500)),
        );
        let fast = Arc::new(ScriptedAdapter::new(ProviderId::Yahoo, vec![quote_payload(2.0)]));
        let resolver = resolver(vec![slow, fast], CacheStore::in_memory(CacheTtls::default()))
            .with_provider_timeout(Duration::from_millis(20));

        let resolved = resolver.resolve::<Quote>(&symbol()).await.expect("resolved");

        assert_eq!(resolved.provenance, ProviderId::Yahoo);
        assert_eq!(resolved.attempts[0].outcome, AttemptOutcome::TransientError);
    }

    #[tokio::test]
    async fn stale_entry_served_only_when_enabled() {
        let adapter = Arc::new(ScriptedAdapter::new(
            ProviderId::Yahoo,
            vec![quote_payload(10.0), ProviderResult::RateLimited(None)],
        ));
        let cache = CacheStore::in_memory(CacheTtls::uniform(Duration::ZERO));
        let strict = resolver(vec![adapter.clone()], cache.clone());
        strict.resolve::<Quote>(&symbol()).await.expect("first fetch");

        assert!(matches!(
            strict.resolve::<Quote>(&symbol()).await,
            Err(ResolveError::RateLimited { .. })
        ));

        let lenient = resolver(vec![adapter], cache).with_serve_stale(true);
        let stale = lenient.resolve::<Quote>(&symbol()).await.expect("stale");
        assert_eq!(stale.cache, CacheStatus::Stale);
        assert_eq!(stale.data.price, 10.0);
    }

    #[tokio::test]
    async fn overview_is_enriched_before_caching() {
        let overview = Overview::empty(symbol());
        let adapter = Arc::new(ScriptedAdapter::new(
            ProviderId::Alphavantage,
            vec![ProviderResult::Success(ProviderPayload::Overview(overview))],
        ));
        let enrichment = StaticEnrichment::new().with_record(
            symbol(),
            EnrichmentRecord {
                sector: Some(String::from("Technology")),
                ..EnrichmentRecord::default()
            },
        );
        let resolver = resolver(vec![adapter], CacheStore::in_memory(CacheTtls::default()))
            .with_enrichment(Arc::new(enrichment));

        resolver.resolve::<Overview>(&symbol()).await.expect("miss");
        let cached = resolver.resolve::<Overview>(&symbol()).await.expect("hit");

        assert_eq!(cached.cache, CacheStatus::Hit);
        assert_eq!(cached.data.sector.as_deref(), Some("Technology"));
        assert_eq!(cached.data.enriched_fields, vec![String::from("sector")]);
    }
}
