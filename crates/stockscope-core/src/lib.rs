//! # Stockscope Core
//!
//! Market data resolution with provider fallback, two-tier caching and a
//! technical analytics engine.
//!
//! ## Overview
//!
//! - **Canonical domain models** for quotes, overviews, daily history and news
//! - **Provider adapters** for Alpha Vantage, Yahoo Finance and Polygon
//! - **Fallback resolver** that walks providers in order and records provenance
//! - **Cache** with an in-process tier in front of a durable `DuckDB` tier
//! - **Analytics** computing moving averages, RSI, ATR, trend, relative
//!   strength and support/resistance from daily history
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Provider adapters (Alpha Vantage, Yahoo, Polygon) |
//! | [`analytics`] | Indicator computations and the technical snapshot |
//! | [`cache`] | Memory and durable cache tiers with per-dataset TTLs |
//! | [`circuit_breaker`] | Circuit breaker for resilient calls |
//! | [`config`] | Service configuration from builder and environment |
//! | [`domain`] | Domain models (Symbol, Quote, Overview, HistoricalSeries) |
//! | [`enrichment`] | Secondary fundamentals source filling overview gaps |
//! | [`error`] | Validation and resolution errors |
//! | [`http_client`] | HTTP client abstraction |
//! | [`normalize`] | Parsing of raw provider values and sentinels |
//! | [`provider`] | Adapter trait, capabilities and per-call results |
//! | [`provider_policy`] | Quota and backoff policies per provider |
//! | [`resolver`] | Cache-first fallback resolution |
//! | [`service`] | Facade used by the CLI |
//! | [`source`] | Provider identifiers |
//! | [`throttling`] | Rate limiting support |
//! | [`warmer`] | Background cache pre-warming |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stockscope_core::{MarketDataService, ServiceConfig, Symbol};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServiceConfig::from_env()?;
//!     let service = MarketDataService::from_config(&config)?;
//!
//!     let record = service.resolve(&Symbol::parse("AAPL")?).await?;
//!     println!("AAPL {:.2} via {}", record.price, record.provenance);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  CLI / Service  │──────────────┐
//! └────────┬────────┘              ▼
//!          │              ┌──────────────────┐
//!          ▼              │ Analytics Engine │
//! ┌─────────────────┐     └──────────────────┘
//! │    Resolver     │────▶┌──────────────────┐
//! └────────┬────────┘     │ Cache (mem + db) │
//!          │              └──────────────────┘
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Provider        │────▶│ HTTP Client      │
//! │ (Adapter Trait) │     │ (reqwest)        │
//! └─────────────────┘     └──────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Every resolution failure carries a stable code:
//!
//! ```rust
//! use stockscope_core::ResolveError;
//!
//! fn describe(error: &ResolveError) -> &'static str {
//!     match error {
//!         ResolveError::NotFound { .. } => "unknown symbol",
//!         ResolveError::RateLimited { .. } => "try again later",
//!         _ => error.code(),
//!     }
//! }
//! ```
//!
//! ## Security
//!
//! - API keys are read from the environment or builder only and never logged
//! - All HTTP requests use TLS via rustls

pub mod adapters;
pub mod analytics;
pub mod cache;
pub mod circuit_breaker;
pub mod config;
pub mod domain;
pub mod enrichment;
pub mod error;
pub mod http_client;
pub mod normalize;
pub mod provider;
pub mod provider_policy;
pub mod resolver;
pub mod service;
pub mod source;
pub mod throttling;
pub mod warmer;

// Adapter implementations
pub use adapters::{AlphaVantageAdapter, PolygonAdapter, YahooAdapter};

// Analytics
pub use analytics::{AnalysisOptions, AnalyticsError, TechnicalSnapshot, Trend};

// Caching
pub use cache::{CacheError, CacheKey, CacheStore, CacheTtls};

// Circuit breaker
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};

// Configuration
pub use config::{CacheLocation, ServiceConfig, ServiceConfigBuilder};

// Domain models
pub use domain::{
    parse_date, CacheStatus, DatasetKind, DateRange, HistoricalSeries, NewsItem, Overview,
    PricePoint, Quote, StockRecord, Symbol, UtcDateTime,
};

// Enrichment
pub use enrichment::{EnrichmentRecord, EnrichmentSource, NoopEnrichment, StaticEnrichment};

// Error types
pub use error::{ResolveError, ValidationError};

// HTTP client types
pub use http_client::{HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient};

// Provider contract
pub use provider::{
    AttemptOutcome, CapabilitySet, Dataset, FetchRequest, HealthState, HealthStatus,
    ProviderAdapter, ProviderPayload, ProviderResult,
};

// Provider policies
pub use provider_policy::{BackoffPolicy, ProviderPolicy};

// Resolution
pub use resolver::{ProviderAttempt, Resolved, Resolver, SourceSnapshot};

// Service facade
pub use service::MarketDataService;

// Source identifiers
pub use source::{parse_provider_order, ProviderId};

// Throttling
pub use throttling::ThrottlingQueue;

// Warm-up
pub use warmer::{CacheWarmer, WarmFailure, WarmHandle, WarmReport};

// Durable tier
pub use stockscope_store::{DurableCache, StoreConfig, StoreError};
