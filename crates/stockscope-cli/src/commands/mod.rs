mod analyze;
mod cache;
mod history;
mod resolve;
mod sources;
mod warm;

use std::time::{Duration, Instant};

use serde_json::Value;
use stockscope_core::{
    parse_provider_order, CacheStatus, MarketDataService, ProviderId, Resolved, ResolveError,
    ServiceConfig, Symbol,
};
use tracing::debug;

use crate::cli::{Cli, Command};
use crate::error::CliError;
use crate::metadata::{Envelope, ErrorEntry, Metadata};

pub struct CommandResult {
    pub data: Value,
    pub source_chain: Vec<ProviderId>,
    pub provenance: Option<ProviderId>,
    pub cache: Option<CacheStatus>,
    pub warnings: Vec<String>,
    pub errors: Vec<ErrorEntry>,
}

impl CommandResult {
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            source_chain: Vec::new(),
            provenance: None,
            cache: None,
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// A single-symbol failure: empty data plus one error entry.
    pub fn failed(error: &ResolveError, symbol: &Symbol) -> Self {
        Self::ok(Value::Null).with_errors(vec![ErrorEntry::from_resolve(error, Some(symbol.as_str()))])
    }

    pub fn with_resolution<T>(mut self, resolved: &Resolved<T>) -> Self {
        self.source_chain = resolved.source_chain.clone();
        self.provenance = Some(resolved.provenance);
        self.cache = Some(resolved.cache);
        self
    }

    pub fn with_source_chain(mut self, source_chain: Vec<ProviderId>) -> Self {
        self.source_chain = source_chain;
        self
    }

    pub fn with_provenance(mut self, provenance: ProviderId, cache: CacheStatus) -> Self {
        self.provenance = Some(provenance);
        self.cache = Some(cache);
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    pub fn with_errors(mut self, errors: Vec<ErrorEntry>) -> Self {
        self.errors.extend(errors);
        self
    }
}

pub async fn run(cli: &Cli) -> Result<Envelope<Value>, CliError> {
    let service = MarketDataService::from_config(&config(cli)?)?;
    let started = Instant::now();

    let result = match &cli.command {
        Command::Resolve(args) => resolve::run(&service, &args.symbol).await?,
        Command::Analyze(args) => analyze::run(&service, args).await?,
        Command::History(args) => history::run(&service, args).await?,
        Command::News(args) => history::news(&service, &args.symbol).await?,
        Command::List(args) => resolve::list(&service, &args.symbols).await?,
        Command::Clear(args) => cache::clear(&service, args).await?,
        Command::Warm(args) => warm::run(&service, &args.symbols).await?,
        Command::Sources => sources::run(&service).await?,
    };

    let CommandResult {
        data,
        source_chain,
        provenance,
        cache,
        warnings,
        errors,
    } = result;

    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    debug!(latency_ms, errors = errors.len(), "command finished");

    Ok(Envelope {
        meta: Metadata {
            source_chain,
            provenance,
            cache,
            latency_ms,
            warnings,
        },
        data,
        errors,
    })
}

/// Environment first, then command-line overrides.
fn config(cli: &Cli) -> Result<ServiceConfig, CliError> {
    let mut builder = ServiceConfig::builder().with_env()?;
    if let Some(order) = &cli.providers {
        builder = builder.with_provider_order(parse_provider_order(order)?);
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        builder = builder.with_provider_timeout(Duration::from_millis(timeout_ms));
    }
    if cli.serve_stale {
        builder = builder.with_serve_stale(true);
    }
    if cli.memory_cache {
        builder = builder.with_memory_cache();
    }
    Ok(builder.build()?)
}

pub(crate) fn parse_symbols(raw: &[String]) -> Result<Vec<Symbol>, CliError> {
    Ok(raw
        .iter()
        .map(|value| Symbol::parse(value))
        .collect::<Result<Vec<_>, _>>()?)
}
