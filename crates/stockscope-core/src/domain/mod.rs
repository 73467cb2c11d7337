//! # Domain Models
//!
//! Canonical domain types for stockscope market data.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Symbol`] | Validated ticker symbol |
//! | [`DatasetKind`] | Kind of data cached per symbol |
//! | [`Quote`] | Point-in-time price with change |
//! | [`Overview`] | Company fundamentals, every field optional |
//! | [`PricePoint`] | Daily OHLCV observation |
//! | [`HistoricalSeries`] | Date-ordered daily history |
//! | [`NewsItem`] | Headline linked to a symbol |
//! | [`StockRecord`] | Quote and overview merged, with provenance |
//!
//! Constructors validate their invariants; an invalid series or price point is
//! rejected with a [`ValidationError`](crate::ValidationError) rather than
//! stored.

mod dataset;
mod models;
mod symbol;
mod timestamp;

pub use dataset::{parse_date, DatasetKind, DateRange};
pub use models::{
    CacheStatus, HistoricalSeries, NewsItem, Overview, PricePoint, Quote, StockRecord,
};
pub use symbol::Symbol;
pub use timestamp::UtcDateTime;
