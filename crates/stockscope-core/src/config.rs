//! Service configuration.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `STOCKSCOPE_PROVIDER_ORDER` | `alphavantage,yahoo,polygon` |
//! | `STOCKSCOPE_ALPHAVANTAGE_API_KEY` / `ALPHAVANTAGE_API_KEY` | unset; adapter omitted |
//! | `STOCKSCOPE_POLYGON_API_KEY` / `POLYGON_API_KEY` | unset; adapter omitted |
//! | `STOCKSCOPE_BENCHMARK` | `SPY` |
//! | `STOCKSCOPE_HOME` | `~/.stockscope` |
//! | `STOCKSCOPE_PROVIDER_TIMEOUT_MS` | `10000` |
//! | `STOCKSCOPE_SERVE_STALE` | `false` |

use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use stockscope_store::StoreConfig;
use tracing::info;

use crate::adapters::{AlphaVantageAdapter, PolygonAdapter, YahooAdapter};
use crate::cache::CacheTtls;
use crate::http_client::HttpClient;
use crate::provider::ProviderAdapter;
use crate::resolver::DEFAULT_PROVIDER_TIMEOUT;
use crate::{parse_provider_order, ProviderId, Symbol, ValidationError};

pub const DEFAULT_BENCHMARK: &str = "SPY";

/// Where cached payloads live.
#[derive(Debug, Clone)]
pub enum CacheLocation {
    /// Memory tier only.
    Memory,
    /// Memory tier in front of a `DuckDB` file.
    Durable(StoreConfig),
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub provider_order: Vec<ProviderId>,
    pub alphavantage_api_key: Option<String>,
    pub polygon_api_key: Option<String>,
    pub benchmark: Symbol,
    pub cache: CacheLocation,
    pub ttls: CacheTtls,
    pub provider_timeout: Duration,
    pub serve_stale: bool,
}

impl ServiceConfig {
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::new()
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ValidationError> {
        ServiceConfigBuilder::new().with_env()?.build()
    }

    /// Adapters in configured order. Keyed providers without a key are left
    /// out.
    pub fn build_adapters(&self, http_client: Arc<dyn HttpClient>) -> Vec<Arc<dyn ProviderAdapter>> {
        let mut adapters: Vec<Arc<dyn ProviderAdapter>> = Vec::new();
        for provider in &self.provider_order {
            match provider {
                ProviderId::Alphavantage => match &self.alphavantage_api_key {
                    Some(key) => adapters.push(Arc::new(AlphaVantageAdapter::new(
                        http_client.clone(),
                        key.clone(),
                    ))),
                    None => info!(%provider, "no API key configured; provider skipped"),
                },
                ProviderId::Polygon => match &self.polygon_api_key {
                    Some(key) => adapters.push(Arc::new(PolygonAdapter::new(
                        http_client.clone(),
                        key.clone(),
                    ))),
                    None => info!(%provider, "no API key configured; provider skipped"),
                },
                ProviderId::Yahoo => adapters.push(Arc::new(YahooAdapter::new(http_client.clone()))),
            }
        }
        adapters
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    provider_order: Vec<ProviderId>,
    alphavantage_api_key: Option<String>,
    polygon_api_key: Option<String>,
    benchmark: String,
    cache: CacheLocation,
    ttls: CacheTtls,
    provider_timeout: Duration,
    serve_stale: bool,
}

impl Default for ServiceConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceConfigBuilder {
    pub fn new() -> Self {
        Self {
            provider_order: ProviderId::ALL.to_vec(),
            alphavantage_api_key: None,
            polygon_api_key: None,
            benchmark: String::from(DEFAULT_BENCHMARK),
            cache: CacheLocation::Durable(StoreConfig::default()),
            ttls: CacheTtls::default(),
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
            serve_stale: false,
        }
    }

    /// Read every `STOCKSCOPE_*` variable and the provider key fallbacks.
    /// Unset variables keep the current values.
    pub fn with_env(mut self) -> Result<Self, ValidationError> {
        if let Some(order) = read_env(&["STOCKSCOPE_PROVIDER_ORDER"]) {
            self.provider_order = parse_provider_order(&order)?;
        }
        if let Some(key) = read_env(ProviderId::Alphavantage.api_key_vars()) {
            self.alphavantage_api_key = Some(key);
        }
        if let Some(key) = read_env(ProviderId::Polygon.api_key_vars()) {
            self.polygon_api_key = Some(key);
        }
        if let Some(benchmark) = read_env(&["STOCKSCOPE_BENCHMARK"]) {
            self.benchmark = benchmark;
        }
        if let Some(home) = read_env(&["STOCKSCOPE_HOME"]) {
            self.cache = CacheLocation::Durable(StoreConfig::at_home(home));
        }
        if let Some(raw) = read_env(&["STOCKSCOPE_PROVIDER_TIMEOUT_MS"]) {
            let millis = raw.parse::<u64>().map_err(|_| ValidationError::InvalidSetting {
                name: "STOCKSCOPE_PROVIDER_TIMEOUT_MS",
                value: raw.clone(),
            })?;
            self.provider_timeout = Duration::from_millis(millis);
        }
        if let Some(raw) = read_env(&["STOCKSCOPE_SERVE_STALE"]) {
            self.serve_stale = parse_flag(&raw).ok_or(ValidationError::InvalidSetting {
                name: "STOCKSCOPE_SERVE_STALE",
                value: raw,
            })?;
        }
        Ok(self)
    }

    pub fn with_provider_order(mut self, order: Vec<ProviderId>) -> Self {
        self.provider_order = order;
        self
    }

    pub fn with_alphavantage_key(mut self, key: impl Into<String>) -> Self {
        self.alphavantage_api_key = Some(key.into());
        self
    }

    pub fn with_polygon_key(mut self, key: impl Into<String>) -> Self {
        self.polygon_api_key = Some(key.into());
        self
    }

    pub fn with_benchmark(mut self, symbol: impl Into<String>) -> Self {
        self.benchmark = symbol.into();
        self
    }

    /// Keep the durable cache under `home`.
    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.cache = CacheLocation::Durable(StoreConfig::at_home(home));
        self
    }

    pub fn with_memory_cache(mut self) -> Self {
        self.cache = CacheLocation::Memory;
        self
    }

    pub fn with_ttls(mut self, ttls: CacheTtls) -> Self {
        self.ttls = ttls;
        self
    }

    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    pub fn with_serve_stale(mut self, serve_stale: bool) -> Self {
        self.serve_stale = serve_stale;
        self
    }

    pub fn build(self) -> Result<ServiceConfig, ValidationError> {
        Ok(ServiceConfig {
            provider_order: self.provider_order,
            alphavantage_api_key: self.alphavantage_api_key,
            polygon_api_key: self.polygon_api_key,
            benchmark: Symbol::parse(&self.benchmark)?,
            cache: self.cache,
            ttls: self.ttls,
            provider_timeout: self.provider_timeout,
            serve_stale: self.serve_stale,
        })
    }
}

/// First non-blank value among `names`.
fn read_env(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| env::var(name).ok())
        .map(|value| value.trim().to_owned())
        .find(|value| !value.is_empty())
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
