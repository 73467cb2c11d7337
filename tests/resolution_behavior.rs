//! Behavior-driven tests for provider-fallback resolution.
//!
//! These tests verify HOW a request travels through the cache and the ordered
//! provider chain, and what the caller learns about where data came from.

mod support;

use std::sync::Arc;
use std::time::Duration;

use stockscope_core::{
    AttemptOutcome, CacheStatus, CacheStore, CacheTtls, CapabilitySet, DatasetKind,
    EnrichmentRecord, MarketDataService, NewsItem, Overview, ProviderId, ProviderPayload,
    ProviderResult, Quote, ResolveError, Resolver, StaticEnrichment,
};
use support::{adapters, symbol, FakeAdapter};

fn resolver(chain: &[Arc<FakeAdapter>]) -> Resolver {
    Resolver::new(adapters(chain), CacheStore::in_memory(CacheTtls::default()))
}

// =============================================================================
// Resolution: Cache First
// =============================================================================

#[tokio::test]
async fn when_a_symbol_was_just_resolved_the_second_request_calls_no_provider() {
    // Given: one healthy provider
    let yahoo = Arc::new(FakeAdapter::healthy(ProviderId::Yahoo, 190.0));
    let resolver = resolver(&[yahoo.clone()]);
    let aapl = symbol("AAPL");

    // When: the same quote is requested twice
    let first = resolver.resolve::<Quote>(&aapl).await.expect("first");
    let second = resolver.resolve::<Quote>(&aapl).await.expect("second");

    // Then: the second answer is served from cache with unchanged provenance
    assert_eq!(yahoo.calls(), 1);
    assert_eq!(first.cache, CacheStatus::Miss);
    assert_eq!(second.cache, CacheStatus::Hit);
    assert_eq!(second.provenance, ProviderId::Yahoo);
    assert!(second.source_chain.is_empty());
    assert_eq!(first.data, second.data);
}

#[tokio::test]
async fn when_user_clears_a_symbol_the_next_request_walks_the_chain_once() {
    // Given: a cached quote
    let yahoo = Arc::new(FakeAdapter::healthy(ProviderId::Yahoo, 50.0));
    let service = MarketDataService::new(resolver(&[yahoo.clone()]), symbol("SPY"));
    let msft = symbol("MSFT");
    service.resolve(&msft).await.expect("warm");
    let calls_before = yahoo.calls();

    // When: the symbol is cleared and requested again
    let removed = service.clear(&msft).await.expect("clear");
    let record = service.resolve(&msft).await.expect("resolve");

    // Then: exactly one new quote call and one new overview call were made
    assert!(removed >= 1);
    assert_eq!(yahoo.calls(), calls_before + 2);
    assert_eq!(record.cache, CacheStatus::Miss);
}

// =============================================================================
// Resolution: Provider Fallback
// =============================================================================

#[tokio::test]
async fn when_first_provider_is_rate_limited_the_next_one_answers() {
    // Given: Alpha Vantage rate limited and Yahoo healthy
    let alpha = Arc::new(FakeAdapter::always(
        ProviderId::Alphavantage,
        ProviderResult::RateLimited(Some(Duration::from_secs(60))),
    ));
    let yahoo = Arc::new(FakeAdapter::healthy(ProviderId::Yahoo, 101.0));
    let resolver = resolver(&[alpha.clone(), yahoo.clone()]);

    // When: a quote is resolved
    let resolved = resolver.resolve::<Quote>(&symbol("IBM")).await.expect("quote");

    // Then: Yahoo's data is returned and the chain records both attempts
    assert_eq!(resolved.provenance, ProviderId::Yahoo);
    assert_eq!(resolved.source_chain, vec![ProviderId::Alphavantage, ProviderId::Yahoo]);
    assert_eq!(
        resolved
            .attempts
            .iter()
            .map(|attempt| attempt.outcome)
            .collect::<Vec<_>>(),
        vec![AttemptOutcome::RateLimited, AttemptOutcome::Success]
    );
    assert_eq!(resolved.data.price, 101.0);
    assert_eq!((alpha.calls(), yahoo.calls()), (1, 1));
}

#[tokio::test]
async fn when_a_provider_succeeds_later_providers_are_never_called() {
    let alpha = Arc::new(FakeAdapter::healthy(ProviderId::Alphavantage, 10.0));
    let yahoo = Arc::new(FakeAdapter::healthy(ProviderId::Yahoo, 20.0));
    let resolver = resolver(&[alpha.clone(), yahoo.clone()]);

    let resolved = resolver.resolve::<Quote>(&symbol("IBM")).await.expect("quote");

    assert_eq!(resolved.provenance, ProviderId::Alphavantage);
    assert_eq!(yahoo.calls(), 0);
}

#[tokio::test]
async fn when_every_provider_misses_the_caller_gets_not_found() {
    // Given: two providers that do not know the symbol
    let alpha = Arc::new(FakeAdapter::always(ProviderId::Alphavantage, ProviderResult::NotFound));
    let polygon = Arc::new(FakeAdapter::always(ProviderId::Polygon, ProviderResult::NotFound));
    let resolver = resolver(&[alpha.clone(), polygon.clone()]);

    // When: a quote is resolved
    let error = resolver
        .resolve::<Quote>(&symbol("ZZZZ"))
        .await
        .expect_err("unknown symbol");

    // Then: each provider was tried once and nothing was cached
    assert!(matches!(error, ResolveError::NotFound { dataset: DatasetKind::Quote, .. }));
    assert_eq!((alpha.calls(), polygon.calls()), (1, 1));
    assert!(resolver.cache().is_empty().await);
}

#[tokio::test]
async fn when_the_chain_is_exhausted_the_last_failure_is_reported() {
    let alpha = Arc::new(FakeAdapter::always(ProviderId::Alphavantage, ProviderResult::NotFound));
    let yahoo = Arc::new(FakeAdapter::always(
        ProviderId::Yahoo,
        ProviderResult::TransientError(String::from("bad gateway")),
    ));

    let error = resolver(&[alpha, yahoo])
        .resolve::<Quote>(&symbol("IBM"))
        .await
        .expect_err("exhausted");

    assert_eq!(error.code(), "resolve.upstream_unavailable");
}

#[tokio::test]
async fn when_a_provider_hangs_its_deadline_advances_the_chain() {
    // Given: a provider slower than the configured deadline
    let slow = Arc::new(
        FakeAdapter::healthy(ProviderId::Alphavantage, 1.0).with_delay(Duration::from_secs(5)),
    );
    let yahoo = Arc::new(FakeAdapter::healthy(ProviderId::Yahoo, 2.0));
    let resolver = resolver(&[slow, yahoo]).with_provider_timeout(Duration::from_millis(50));

    // When: a quote is resolved
    let resolved = resolver.resolve::<Quote>(&symbol("IBM")).await.expect("quote");

    // Then: the slow provider counts as a transient failure
    assert_eq!(resolved.provenance, ProviderId::Yahoo);
    assert_eq!(resolved.attempts[0].outcome, AttemptOutcome::TransientError);
}

#[tokio::test]
async fn providers_without_the_capability_are_skipped() {
    let yahoo = Arc::new(
        FakeAdapter::healthy(ProviderId::Yahoo, 1.0)
            .with_capabilities(CapabilitySet::new(true, false, true, false)),
    );
    let polygon = Arc::new(FakeAdapter::healthy(ProviderId::Polygon, 1.0));
    let resolver = resolver(&[yahoo.clone(), polygon]);

    let resolved = resolver
        .resolve::<Overview>(&symbol("MSFT"))
        .await
        .expect("overview");

    assert_eq!(resolved.source_chain, vec![ProviderId::Polygon]);
    assert_eq!(yahoo.calls(), 0);
}

#[tokio::test]
async fn when_no_provider_serves_a_dataset_it_is_a_configuration_error() {
    let yahoo = Arc::new(
        FakeAdapter::healthy(ProviderId::Yahoo, 1.0)
            .with_capabilities(CapabilitySet::new(true, false, true, false)),
    );

    let error = resolver(&[yahoo])
        .resolve::<Vec<NewsItem>>(&symbol("AAPL"))
        .await
        .expect_err("no news provider");

    assert!(matches!(error, ResolveError::Configuration { dataset: DatasetKind::News }));
}

// =============================================================================
// Resolution: Stale Fallback
// =============================================================================

#[tokio::test]
async fn when_enabled_an_expired_entry_is_served_if_every_provider_fails() {
    // Given: an entry written under a zero TTL and a provider that then fails
    let flaky = Arc::new(FakeAdapter::succeeds_once(ProviderId::Yahoo, 42.0));
    let resolver = Resolver::new(
        adapters(&[flaky]),
        CacheStore::in_memory(CacheTtls::uniform(Duration::ZERO)),
    )
    .with_serve_stale(true);
    let aapl = symbol("AAPL");
    resolver.resolve::<Quote>(&aapl).await.expect("first");

    // When: the quote is requested again
    let resolved = resolver.resolve::<Quote>(&aapl).await.expect("stale");

    // Then: the old value comes back marked stale
    assert_eq!(resolved.cache, CacheStatus::Stale);
    assert_eq!(resolved.data.price, 42.0);
}

#[tokio::test]
async fn stale_entries_are_not_served_by_default() {
    let flaky = Arc::new(FakeAdapter::succeeds_once(ProviderId::Yahoo, 42.0));
    let resolver = Resolver::new(
        adapters(&[flaky]),
        CacheStore::in_memory(CacheTtls::uniform(Duration::ZERO)),
    );
    let aapl = symbol("AAPL");
    resolver.resolve::<Quote>(&aapl).await.expect("first");

    let error = resolver.resolve::<Quote>(&aapl).await.expect_err("no stale");

    assert!(matches!(error, ResolveError::UpstreamUnavailable { .. }));
}

// =============================================================================
// Service: Record Assembly
// =============================================================================

#[tokio::test]
async fn when_provider_leaves_gaps_enrichment_fills_them_without_overriding() {
    // Given: a provider overview without P/E and an enrichment record with one
    let polygon = Arc::new(FakeAdapter::healthy(ProviderId::Polygon, 300.0));
    let enrichment = StaticEnrichment::new().with_record(
        symbol("MSFT"),
        EnrichmentRecord {
            pe_ratio: Some(String::from("35.2")),
            sector: Some(String::from("Consumer")),
            description: Some(String::from("N/A")),
            ..EnrichmentRecord::default()
        },
    );
    let service = MarketDataService::new(resolver(&[polygon]), symbol("SPY"))
        .with_enrichment(Arc::new(enrichment));

    // When: the record is resolved
    let record = service.resolve(&symbol("MSFT")).await.expect("record");

    // Then: only the missing P/E is filled; sentinels never become values
    assert_eq!(record.pe_ratio, Some(35.2));
    assert_eq!(record.sector.as_deref(), Some("Technology"));
    assert_eq!(record.description, None);
    assert_eq!(record.enriched_fields, vec![String::from("pe_ratio")]);
    assert_eq!(record.provenance, ProviderId::Polygon);
}

#[tokio::test]
async fn when_the_quote_cannot_be_resolved_the_record_fails() {
    let polygon = Arc::new(FakeAdapter::new(ProviderId::Polygon, |request| {
        match request.dataset {
            DatasetKind::Quote => ProviderResult::NotFound,
            _ => ProviderResult::Success(support::payload_for(request, 1.0)),
        }
    }));
    let service = MarketDataService::new(resolver(&[polygon]), symbol("SPY"));

    let error = service.resolve(&symbol("GONE")).await.expect_err("no quote");

    assert_eq!(error.code(), "resolve.not_found");
}

#[tokio::test]
async fn list_reports_each_symbol_independently() {
    let polygon = Arc::new(FakeAdapter::new(ProviderId::Polygon, |request| {
        if request.symbol.as_str() == "GONE" {
            ProviderResult::NotFound
        } else {
            ProviderResult::Success(support::payload_for(request, 12.0))
        }
    }));
    let service = MarketDataService::new(resolver(&[polygon]), symbol("SPY"));

    let results = service
        .list(&[symbol("AAPL"), symbol("GONE"), symbol("MSFT")])
        .await;

    assert_eq!(results.len(), 3);
    assert!(results[0].1.is_ok());
    assert!(results[1].1.is_err());
    assert!(results[2].1.is_ok());
}

#[tokio::test]
async fn sources_report_configured_order_and_capabilities() {
    let yahoo = Arc::new(
        FakeAdapter::healthy(ProviderId::Yahoo, 1.0)
            .with_capabilities(CapabilitySet::new(true, false, true, false)),
    );
    let polygon = Arc::new(FakeAdapter::healthy(ProviderId::Polygon, 1.0));
    let service = MarketDataService::new(resolver(&[yahoo, polygon]), symbol("SPY"));

    let sources = service.sources().await;

    assert_eq!(service.provider_order(), vec![ProviderId::Yahoo, ProviderId::Polygon]);
    assert_eq!(sources.len(), 2);
    assert!(sources.iter().all(|source| source.available()));
    assert_eq!(
        sources[0].capabilities.supported_datasets(),
        vec!["quote", "history"]
    );
}

#[tokio::test]
async fn a_payload_of_the_wrong_kind_is_treated_as_a_transient_failure() {
    let confused = Arc::new(FakeAdapter::new(ProviderId::Alphavantage, |request| {
        ProviderResult::Success(ProviderPayload::Overview(support::overview(&request.symbol)))
    }));
    let yahoo = Arc::new(FakeAdapter::healthy(ProviderId::Yahoo, 7.0));

    let resolved = resolver(&[confused, yahoo])
        .resolve::<Quote>(&symbol("IBM"))
        .await
        .expect("quote");

    assert_eq!(resolved.provenance, ProviderId::Yahoo);
    assert_eq!(resolved.attempts[0].outcome, AttemptOutcome::TransientError);
}
