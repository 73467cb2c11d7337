//! CLI argument definitions for stockscope.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `resolve` | Quote merged with company overview |
//! | `analyze` | Technical snapshot from daily history |
//! | `history` | Daily OHLCV history |
//! | `news` | Recent headlines |
//! | `list` | Summary records for several symbols |
//! | `clear` | Drop cached data |
//! | `warm` | Pre-load the cache for several symbols |
//! | `sources` | Configured providers and their health |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--strict` | `false` | Treat warnings as errors |
//! | `--providers` | env / `alphavantage,yahoo,polygon` | Provider order |
//! | `--timeout-ms` | env / `10000` | Per-provider deadline |
//! | `--serve-stale` | `false` | Fall back to expired cache entries |
//! | `--memory-cache` | `false` | Skip the durable cache file |
//!
//! # Examples
//!
//! ```bash
//! stockscope resolve AAPL --pretty
//! stockscope analyze MSFT --lookback 90
//! stockscope history AAPL --start 2024-01-01 --end 2024-03-31
//! stockscope clear --all
//! ```

use clap::{Args, Parser, Subcommand};

/// Market data resolution with provider fallback and technical analysis.
#[derive(Debug, Parser)]
#[command(
    name = "stockscope",
    author,
    version,
    about = "Market data with provider fallback, caching and technical analysis",
    long_about = "stockscope resolves quotes, company overviews, daily history and news \
by querying Alpha Vantage, Yahoo Finance and Polygon in priority order.\n\
\n\
  • Results are cached in memory and in a local DuckDB file\n\
  • Every answer records which provider produced it\n\
  • Technical snapshots cover moving averages, RSI, ATR, trend and levels\n\
\n\
Use 'stockscope <command> --help' for command-specific help."
)]
pub struct Cli {
    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Treat warnings as failures (exit code 5).
    #[arg(long, global = true, default_value_t = false)]
    pub strict: bool,

    /// Comma-separated provider order, e.g. `yahoo,polygon`.
    #[arg(long, global = true)]
    pub providers: Option<String>,

    /// Per-provider call deadline in milliseconds.
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Return an expired cache entry when every provider fails.
    #[arg(long, global = true, default_value_t = false)]
    pub serve_stale: bool,

    /// Keep the cache in memory only for this invocation.
    #[arg(long, global = true, default_value_t = false)]
    pub memory_cache: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Quote and overview for one symbol.
    ///
    ///   stockscope resolve AAPL
    Resolve(SymbolArgs),

    /// Technical indicators, trend and levels for one symbol.
    ///
    ///   stockscope analyze AAPL
    ///   stockscope analyze AAPL --lookback 60
    Analyze(AnalyzeArgs),

    /// Daily OHLCV history, optionally narrowed to a date range.
    ///
    ///   stockscope history AAPL --start 2024-01-01 --end 2024-06-30
    History(HistoryArgs),

    /// Recent news headlines for one symbol.
    News(SymbolArgs),

    /// Summary records for several symbols. One failure does not stop the
    /// batch.
    List(SymbolsArgs),

    /// Drop cached data for one symbol, or everything with `--all`.
    Clear(ClearArgs),

    /// Pre-load record and history for several symbols and wait for the
    /// report.
    Warm(SymbolsArgs),

    /// Configured providers, their capabilities and health.
    Sources,
}

#[derive(Debug, Args)]
pub struct SymbolArgs {
    /// Ticker symbol (e.g., AAPL, BRK.B).
    pub symbol: String,
}

#[derive(Debug, Args)]
pub struct SymbolsArgs {
    /// One or more ticker symbols.
    #[arg(required = true, num_args = 1..)]
    pub symbols: Vec<String>,
}

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    pub symbol: String,

    /// Number of trailing indicator points to include.
    #[arg(long, default_value_t = 180)]
    pub lookback: usize,
}

#[derive(Debug, Args)]
pub struct HistoryArgs {
    pub symbol: String,

    /// First date to include (YYYY-MM-DD).
    #[arg(long, requires = "end")]
    pub start: Option<String>,

    /// Last date to include (YYYY-MM-DD).
    #[arg(long, requires = "start")]
    pub end: Option<String>,
}

#[derive(Debug, Args)]
pub struct ClearArgs {
    /// Symbol whose cached datasets are dropped.
    #[arg(required_unless_present = "all", conflicts_with = "all")]
    pub symbol: Option<String>,

    /// Drop every cached entry.
    #[arg(long, default_value_t = false)]
    pub all: bool,
}
