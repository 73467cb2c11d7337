//! Market data facade used by the CLI and any route layer.

use std::sync::Arc;

use stockscope_store::DurableCache;
use tracing::warn;

use crate::analytics::trend::RELATIVE_STRENGTH_PERIODS;
use crate::analytics::{self, AnalysisOptions, TechnicalSnapshot, DEFAULT_LOOKBACK};
use crate::cache::{CacheError, CacheKey, CacheStore};
use crate::config::{CacheLocation, ServiceConfig};
use crate::enrichment::EnrichmentSource;
use crate::http_client::{HttpClient, ReqwestHttpClient};
use crate::resolver::{Resolved, Resolver, SourceSnapshot};
use crate::warmer::{CacheWarmer, WarmHandle};
use crate::{
    CacheStatus, DatasetKind, DateRange, HistoricalSeries, NewsItem, Overview, ProviderId, Quote,
    ResolveError, StockRecord, Symbol,
};

/// Cheap to clone; clones share the resolver and its cache.
#[derive(Clone)]
pub struct MarketDataService {
    resolver: Arc<Resolver>,
    benchmark: Symbol,
}

impl MarketDataService {
    pub fn new(resolver: Resolver, benchmark: Symbol) -> Self {
        Self {
            resolver: Arc::new(resolver),
            benchmark,
        }
    }

    /// Production wiring: `reqwest` transport and the configured cache.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, CacheError> {
        Self::with_http_client(config, Arc::new(ReqwestHttpClient::new()))
    }

    pub fn with_http_client(
        config: &ServiceConfig,
        http_client: Arc<dyn HttpClient>,
    ) -> Result<Self, CacheError> {
        let cache = match &config.cache {
            CacheLocation::Memory => CacheStore::in_memory(config.ttls),
            CacheLocation::Durable(store) => {
                CacheStore::with_durable(DurableCache::open(store.clone())?, config.ttls)
            }
        };
        let resolver = Resolver::new(config.build_adapters(http_client), cache)
            .with_provider_timeout(config.provider_timeout)
            .with_serve_stale(config.serve_stale);
        Ok(Self::new(resolver, config.benchmark.clone()))
    }

    /// Replace the enrichment collaborator. Only valid before the service is
    /// cloned.
    pub fn with_enrichment(self, enrichment: Arc<dyn EnrichmentSource>) -> Self {
        match Arc::try_unwrap(self.resolver) {
            Ok(resolver) => Self::new(resolver.with_enrichment(enrichment), self.benchmark),
            Err(shared) => {
                warn!("enrichment ignored: service already shared");
                Self {
                    resolver: shared,
                    benchmark: self.benchmark,
                }
            }
        }
    }

    pub fn benchmark(&self) -> &Symbol {
        &self.benchmark
    }

    pub fn provider_order(&self) -> Vec<ProviderId> {
        self.resolver.provider_order()
    }

    pub fn cache(&self) -> &CacheStore {
        self.resolver.cache()
    }

    /// Quote merged with the overview. The quote is required; a failed
    /// overview only adds a warning.
    pub async fn resolve(&self, symbol: &Symbol) -> Result<StockRecord, ResolveError> {
        let quote = self.resolver.resolve::<Quote>(symbol).await?;

        let mut warnings = Vec::new();
        let overview = match self.resolver.resolve::<Overview>(symbol).await {
            Ok(overview) => Some(overview),
            Err(error) => {
                warn!(%symbol, code = error.code(), "overview unavailable");
                warnings.push(format!("overview unavailable: {error}"));
                None
            }
        };

        let cache = combined_status(quote.cache, overview.as_ref().map(|overview| overview.cache));
        let mut record = StockRecord::assemble(
            quote.data,
            quote.provenance,
            overview.map(|overview| (overview.data, overview.provenance)),
        );
        record.cache = cache;
        record.warnings = warnings;
        Ok(record)
    }

    pub async fn analyze(&self, symbol: &Symbol) -> Result<TechnicalSnapshot, ResolveError> {
        self.analyze_with_lookback(symbol, DEFAULT_LOOKBACK).await
    }

    /// Technical snapshot echoing the trailing `lookback` indicator points.
    /// Cached per lookback under the `indicators` TTL.
    ///
    /// When the benchmark history cannot be resolved, every relative strength
    /// period is listed in `insufficient_history` and the snapshot is not
    /// cached, so the next call retries the benchmark.
    pub async fn analyze_with_lookback(
        &self,
        symbol: &Symbol,
        lookback: usize,
    ) -> Result<TechnicalSnapshot, ResolveError> {
        let key = CacheKey::new(symbol.clone(), DatasetKind::Indicators)
            .with_qualifier(lookback.to_string());
        if let Some(snapshot) = self.cache().get_json::<TechnicalSnapshot>(&key).await? {
            return Ok(snapshot);
        }

        let series = self.resolver.resolve::<HistoricalSeries>(symbol).await?.data;
        let benchmark = if *symbol == self.benchmark {
            Some(series.clone())
        } else {
            match self.resolver.resolve::<HistoricalSeries>(&self.benchmark).await {
                Ok(resolved) => Some(resolved.data),
                Err(error) => {
                    warn!(benchmark = %self.benchmark, code = error.code(), "benchmark history unavailable; relative strength skipped");
                    None
                }
            }
        };

        let options = AnalysisOptions {
            lookback,
            ..AnalysisOptions::default()
        };
        let mut snapshot = analytics::analyze(&series, benchmark.as_ref(), &options)?;

        if benchmark.is_none() {
            snapshot.insufficient_history.extend(
                RELATIVE_STRENGTH_PERIODS.map(|period| format!("relative_strength_{period}")),
            );
            return Ok(snapshot);
        }
        if let Err(error) = self.cache().set_json(&key, &snapshot).await {
            warn!(key = %key, %error, "indicator snapshot not cached");
        }
        Ok(snapshot)
    }

    /// Daily history, optionally narrowed to `range`.
    pub async fn history(
        &self,
        symbol: &Symbol,
        range: Option<DateRange>,
    ) -> Result<Resolved<HistoricalSeries>, ResolveError> {
        let mut resolved = self.resolver.resolve::<HistoricalSeries>(symbol).await?;
        if let Some(range) = range {
            resolved.data = resolved.data.within(&range);
        }
        Ok(resolved)
    }

    pub async fn news(&self, symbol: &Symbol) -> Result<Resolved<Vec<NewsItem>>, ResolveError> {
        self.resolver.resolve::<Vec<NewsItem>>(symbol).await
    }

    /// Resolve each symbol in turn; one failure does not stop the batch.
    pub async fn list(&self, symbols: &[Symbol]) -> Vec<(Symbol, Result<StockRecord, ResolveError>)> {
        let mut results = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            results.push((symbol.clone(), self.resolve(symbol).await));
        }
        results
    }

    /// Forget every cached dataset of `symbol`.
    pub async fn clear(&self, symbol: &Symbol) -> Result<usize, ResolveError> {
        Ok(self.cache().clear(symbol).await?)
    }

    pub async fn clear_all(&self) -> Result<usize, ResolveError> {
        Ok(self.cache().clear_all().await?)
    }

    /// Pre-warm `symbols` in the background.
    pub fn warm(&self, symbols: Vec<Symbol>) -> WarmHandle {
        CacheWarmer::new(self.clone()).spawn(symbols)
    }

    pub async fn sources(&self) -> Vec<SourceSnapshot> {
        self.resolver.sources().await
    }
}

fn combined_status(quote: CacheStatus, overview: Option<CacheStatus>) -> CacheStatus {
    match (quote, overview) {
        (CacheStatus::Stale, _) | (_, Some(CacheStatus::Stale)) => CacheStatus::Stale,
        (CacheStatus::Hit, Some(CacheStatus::Hit) | None) => CacheStatus::Hit,
        _ => CacheStatus::Miss,
    }
}
