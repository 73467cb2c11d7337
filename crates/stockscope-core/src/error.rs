use std::time::Duration;

use thiserror::Error;

use crate::analytics::AnalyticsError;
use crate::cache::CacheError;
use crate::{DatasetKind, Symbol};

/// Validation and contract errors exposed by `stockscope-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("symbol length {len} exceeds max {max}")]
    SymbolTooLong { len: usize, max: usize },
    #[error("symbol must start with an ASCII letter or '^': '{ch}'")]
    SymbolInvalidStart { ch: char },
    #[error("symbol contains invalid character '{ch}' at index {index}")]
    SymbolInvalidChar { ch: char, index: usize },

    #[error("invalid provider '{value}', expected one of alphavantage, yahoo, polygon")]
    InvalidProvider { value: String },
    #[error("invalid dataset '{value}', expected one of quote, overview, history, news, indicators")]
    InvalidDataset { value: String },

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },
    #[error("date must be YYYY-MM-DD: '{value}'")]
    InvalidDate { value: String },
    #[error("date range start {start} is after end {end}")]
    InvalidDateRange { start: String, end: String },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },
    #[error("price point high must be >= low")]
    InvalidPriceRange,
    #[error("historical series contains duplicate date {date}")]
    DuplicateDate { date: String },

    #[error("invalid value for {name}: '{value}'")]
    InvalidSetting { name: &'static str, value: String },
}

/// Failure of a single resolution request.
///
/// Provider faults are classified by the adapters before they reach this type;
/// callers see one of these variants and never a raw transport error.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("{dataset} for {symbol} was not found by any provider")]
    NotFound { symbol: Symbol, dataset: DatasetKind },

    #[error("{dataset} for {symbol} is rate limited by every provider")]
    RateLimited {
        symbol: Symbol,
        dataset: DatasetKind,
        retry_after: Option<Duration>,
    },

    #[error("{dataset} for {symbol} is unavailable upstream: {detail}")]
    UpstreamUnavailable {
        symbol: Symbol,
        dataset: DatasetKind,
        detail: String,
    },

    #[error("no configured provider supports dataset '{dataset}'")]
    Configuration { dataset: DatasetKind },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Analytics(#[from] AnalyticsError),
}

impl ResolveError {
    /// Stable machine-readable code, used by the CLI error payload.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "resolve.not_found",
            Self::RateLimited { .. } => "resolve.rate_limited",
            Self::UpstreamUnavailable { .. } => "resolve.upstream_unavailable",
            Self::Configuration { .. } => "resolve.configuration",
            Self::Validation(_) => "resolve.validation",
            Self::Cache(_) => "resolve.cache",
            Self::Analytics(_) => "resolve.analytics",
        }
    }
}
