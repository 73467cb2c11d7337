//! Technical analytics over a daily price history.
//!
//! [`analyze`] is deterministic: the same series (and benchmark) always give
//! the same [`TechnicalSnapshot`]. A series too short for some window yields a
//! partial snapshot whose nulled metrics are named in
//! `insufficient_history`; only an empty series is an error.
//!
//! | Metric | Window |
//! |--------|--------|
//! | SMA | 20, 50, 200 |
//! | RSI | 14 |
//! | ATR | 14 |
//! | Volume ratio | 20 |
//! | Relative strength | 21, 63, 126, 252 (+1 point each) |
//! | Support/resistance | trailing 30 |
//! | 52-week range | trailing 252 |

pub mod indicators;
pub mod levels;
pub mod trend;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::Date;

use crate::{HistoricalSeries, Symbol};

pub use indicators::{atr, rolling_mean, rsi, sma, true_range, volume_ratio};
pub use levels::{cluster_levels, support_resistance, year_range, SupportResistance, YearRange};
pub use trend::{classify_trend, relative_strength, RelativeStrength, Trend};

pub const DEFAULT_LOOKBACK: usize = 180;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AnalyticsError {
    #[error("cannot analyze an empty price series")]
    EmptySeries,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisOptions {
    /// Trailing points echoed in `points`.
    pub lookback: usize,
    /// Relative distance under which pivot prices merge into one level.
    pub level_threshold: f64,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            lookback: DEFAULT_LOOKBACK,
            level_threshold: levels::DEFAULT_CLUSTER_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RsiZone {
    Overbought,
    Neutral,
    Oversold,
}

impl RsiZone {
    pub fn from_rsi(rsi: f64) -> Self {
        if rsi > 70.0 {
            Self::Overbought
        } else if rsi < 30.0 {
            Self::Oversold
        } else {
            Self::Neutral
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolatilityLevel {
    Low,
    Medium,
    High,
}

impl VolatilityLevel {
    /// Buckets ATR as a percentage of price.
    pub fn from_atr_percent(atr_percent: f64) -> Self {
        if atr_percent < 3.0 {
            Self::Low
        } else if atr_percent < 8.0 {
            Self::Medium
        } else {
            Self::High
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovingAverages {
    pub sma20: Option<f64>,
    pub sma50: Option<f64>,
    pub sma200: Option<f64>,
    /// Percent distance of the price above (positive) or below each average.
    pub price_vs_sma20: Option<f64>,
    pub price_vs_sma50: Option<f64>,
    pub price_vs_sma200: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Momentum {
    pub rsi: Option<f64>,
    pub rsi_zone: Option<RsiZone>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Volatility {
    pub atr: Option<f64>,
    pub atr_percent: Option<f64>,
    pub level: Option<VolatilityLevel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumeStats {
    pub current: u64,
    pub average: Option<f64>,
    pub ratio: Option<f64>,
}

/// Indicator values at one date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorPoint {
    pub date: Date,
    pub close: f64,
    pub sma20: Option<f64>,
    pub sma50: Option<f64>,
    pub sma200: Option<f64>,
    pub rsi14: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalSnapshot {
    pub symbol: Symbol,
    pub as_of: Date,
    pub price: f64,
    pub moving_averages: MovingAverages,
    pub momentum: Momentum,
    pub volatility: Volatility,
    pub volume: VolumeStats,
    pub trend: Option<Trend>,
    pub benchmark: Option<Symbol>,
    pub relative_strength: Vec<RelativeStrength>,
    pub levels: SupportResistance,
    pub range_52w: Option<YearRange>,
    pub points: Vec<IndicatorPoint>,
    pub insufficient_history: Vec<String>,
}

/// Compute every metric at the last point of `series`.
pub fn analyze(
    series: &HistoricalSeries,
    benchmark: Option<&HistoricalSeries>,
    options: &AnalysisOptions,
) -> Result<TechnicalSnapshot, AnalyticsError> {
    let points = series.points();
    let last = *points.last().ok_or(AnalyticsError::EmptySeries)?;
    let price = last.close;
    let closes = series.closes();
    let volumes: Vec<u64> = points.iter().map(|point| point.volume).collect();

    let [sma20_series, sma50_series, sma200_series] =
        indicators::SMA_WINDOWS.map(|window| sma(&closes, window));
    let rsi_series = rsi(&closes, indicators::RSI_PERIOD);
    let at_last = |values: &[Option<f64>]| values.last().copied().flatten();

    let sma20 = at_last(&sma20_series);
    let sma50 = at_last(&sma50_series);
    let sma200 = at_last(&sma200_series);
    let rsi14 = at_last(&rsi_series);
    let atr14 = at_last(&atr(points, indicators::ATR_PERIOD));
    let atr_percent = atr14.and_then(|atr| (price != 0.0).then(|| atr / price * 100.0));

    let mut insufficient = Vec::new();
    for (name, value) in [
        ("sma20", sma20),
        ("sma50", sma50),
        ("sma200", sma200),
        ("rsi14", rsi14),
        ("atr14", atr14),
    ] {
        if value.is_none() {
            insufficient.push(name.to_owned());
        }
    }
    if volumes.len() < indicators::VOLUME_WINDOW {
        insufficient.push(String::from("volume_ratio"));
    }
    if sma50.is_none() {
        insufficient.push(String::from("trend"));
    }

    let relative = match benchmark {
        Some(benchmark) => {
            let values = relative_strength(&closes, &benchmark.closes());
            for period in trend::RELATIVE_STRENGTH_PERIODS {
                if !values.iter().any(|value| value.period == period) {
                    insufficient.push(format!("relative_strength_{period}"));
                }
            }
            values
        }
        None => Vec::new(),
    };

    let start = points.len().saturating_sub(options.lookback);
    let indicator_points = (start..points.len())
        .map(|index| IndicatorPoint {
            date: points[index].date,
            close: points[index].close,
            sma20: sma20_series[index],
            sma50: sma50_series[index],
            sma200: sma200_series[index],
            rsi14: rsi_series[index],
        })
        .collect();

    Ok(TechnicalSnapshot {
        symbol: series.symbol().clone(),
        as_of: last.date,
        price,
        moving_averages: MovingAverages {
            sma20,
            sma50,
            sma200,
            price_vs_sma20: percent_from(price, sma20),
            price_vs_sma50: percent_from(price, sma50),
            price_vs_sma200: percent_from(price, sma200),
        },
        momentum: Momentum {
            rsi: rsi14,
            rsi_zone: rsi14.map(RsiZone::from_rsi),
        },
        volatility: Volatility {
            atr: atr14,
            atr_percent,
            level: atr_percent.map(VolatilityLevel::from_atr_percent),
        },
        volume: VolumeStats {
            current: last.volume,
            average: indicators::average_volume(&volumes, indicators::VOLUME_WINDOW),
            ratio: volume_ratio(&volumes, indicators::VOLUME_WINDOW),
        },
        trend: classify_trend(price, sma50, sma200),
        benchmark: benchmark.map(|benchmark| benchmark.symbol().clone()),
        relative_strength: relative,
        levels: support_resistance(points, levels::LEVEL_WINDOW, options.level_threshold),
        range_52w: year_range(points, price),
        points: indicator_points,
        insufficient_history: insufficient,
    })
}

fn percent_from(price: f64, reference: Option<f64>) -> Option<f64> {
    reference
        .filter(|reference| *reference != 0.0)
        .map(|reference| (price - reference) / reference * 100.0)
}
