use serde::{Deserialize, Serialize};

use crate::PricePoint;

pub const LEVEL_WINDOW: usize = 30;
pub const DEFAULT_CLUSTER_THRESHOLD: f64 = 0.01;
pub const YEAR_WINDOW: usize = 252;

/// Clustered pivot prices, ascending.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SupportResistance {
    pub support: Vec<f64>,
    pub resistance: Vec<f64>,
}

/// Pivot levels over the trailing `window` points.
///
/// A resistance pivot's high is strictly above both neighbours' highs; a
/// support pivot's low is strictly below both neighbours' lows. The first
/// and last points of the window never qualify.
pub fn support_resistance(points: &[PricePoint], window: usize, threshold: f64) -> SupportResistance {
    let trailing = &points[points.len().saturating_sub(window)..];
    let mut highs = Vec::new();
    let mut lows = Vec::new();

    for triple in trailing.windows(3) {
        let [previous, current, next] = triple else {
            continue;
        };
        if current.high > previous.high && current.high > next.high {
            highs.push(current.high);
        }
        if current.low < previous.low && current.low < next.low {
            lows.push(current.low);
        }
    }

    SupportResistance {
        support: cluster_levels(&lows, threshold),
        resistance: cluster_levels(&highs, threshold),
    }
}

/// Group ascending values while each stays within `threshold` (relative) of
/// the running cluster mean; emit each mean rounded to cents.
pub fn cluster_levels(values: &[f64], threshold: f64) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|value| value.is_finite()).collect();
    sorted.sort_by(f64::total_cmp);

    let mut levels = Vec::new();
    let mut cluster: Vec<f64> = Vec::new();
    for value in sorted {
        if let Some(mean) = mean(&cluster) {
            if mean == 0.0 || ((value - mean) / mean).abs() > threshold {
                levels.push(round_cents(mean));
                cluster.clear();
            }
        }
        cluster.push(value);
    }
    if let Some(mean) = mean(&cluster) {
        levels.push(round_cents(mean));
    }
    levels
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Trailing-year extremes and the price's distance from them, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YearRange {
    pub high: f64,
    pub low: f64,
    pub percent_from_high: f64,
    pub percent_from_low: f64,
}

/// Range over the trailing [`YEAR_WINDOW`] points, or fewer when that is all
/// there is. `None` only for an empty slice.
pub fn year_range(points: &[PricePoint], price: f64) -> Option<YearRange> {
    let trailing = &points[points.len().saturating_sub(YEAR_WINDOW)..];
    let high = trailing.iter().map(|point| point.high).reduce(f64::max)?;
    let low = trailing.iter().map(|point| point.low).reduce(f64::min)?;
    let distance = |reference: f64| {
        if reference == 0.0 {
            0.0
        } else {
            (price - reference) / reference * 100.0
        }
    };

    Some(YearRange {
        high,
        low,
        percent_from_high: distance(high),
        percent_from_low: distance(low),
    })
}
