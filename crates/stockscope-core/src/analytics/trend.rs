use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Lookbacks, in trading days, for relative strength against the benchmark.
pub const RELATIVE_STRENGTH_PERIODS: [usize; 4] = [21, 63, 126, 252];

/// Price position relative to the 50- and 200-day averages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    #[serde(rename = "Strong Uptrend")]
    StrongUptrend,
    #[serde(rename = "Uptrend")]
    Uptrend,
    #[serde(rename = "Strong Downtrend")]
    StrongDowntrend,
    #[serde(rename = "Downtrend")]
    Downtrend,
    #[serde(rename = "Sideways")]
    Sideways,
}

impl Trend {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StrongUptrend => "Strong Uptrend",
            Self::Uptrend => "Uptrend",
            Self::StrongDowntrend => "Strong Downtrend",
            Self::Downtrend => "Downtrend",
            Self::Sideways => "Sideways",
        }
    }
}

impl Display for Trend {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First matching rule wins. Without `sma200` only the plain variants apply.
pub fn classify_trend(price: f64, sma50: Option<f64>, sma200: Option<f64>) -> Option<Trend> {
    let sma50 = sma50?;
    let trend = match sma200 {
        Some(sma200) if price > sma50 && sma50 > sma200 => Trend::StrongUptrend,
        _ if price > sma50 => Trend::Uptrend,
        Some(sma200) if price < sma50 && sma50 < sma200 => Trend::StrongDowntrend,
        _ if price < sma50 => Trend::Downtrend,
        _ => Trend::Sideways,
    };
    Some(trend)
}

/// Excess return over the benchmark for one lookback, in percentage points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelativeStrength {
    pub period: usize,
    pub stock_return: f64,
    pub benchmark_return: f64,
    pub relative_strength: f64,
    pub outperforming: bool,
}

/// Relative strength for every period both close series can cover.
///
/// A period `p` needs `p + 1` closes so that `close[last - p]` exists.
pub fn relative_strength(stock: &[f64], benchmark: &[f64]) -> Vec<RelativeStrength> {
    RELATIVE_STRENGTH_PERIODS
        .into_iter()
        .filter_map(|period| {
            let stock_return = period_return(stock, period)?;
            let benchmark_return = period_return(benchmark, period)?;
            let relative_strength = (stock_return - benchmark_return) * 100.0;
            Some(RelativeStrength {
                period,
                stock_return,
                benchmark_return,
                relative_strength,
                outperforming: relative_strength > 0.0,
            })
        })
        .collect()
}

fn period_return(closes: &[f64], period: usize) -> Option<f64> {
    let last = closes.len().checked_sub(1)?;
    let base = closes[last.checked_sub(period)?];
    (base != 0.0).then(|| closes[last] / base - 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_examples() {
        assert_eq!(
            classify_trend(110.0, Some(100.0), Some(90.0)),
            Some(Trend::StrongUptrend)
        );
        assert_eq!(
            classify_trend(95.0, Some(100.0), Some(110.0)),
            Some(Trend::StrongDowntrend)
        );
        assert_eq!(classify_trend(100.0, Some(100.0), Some(90.0)), Some(Trend::Sideways));
        assert_eq!(classify_trend(105.0, Some(100.0), Some(120.0)), Some(Trend::Uptrend));
        assert_eq!(classify_trend(95.0, Some(100.0), Some(90.0)), Some(Trend::Downtrend));
    }

    #[test]
    fn missing_sma200_disables_only_strong_variants() {
        assert_eq!(classify_trend(110.0, Some(100.0), None), Some(Trend::Uptrend));
        assert_eq!(classify_trend(90.0, Some(100.0), None), Some(Trend::Downtrend));
        assert_eq!(classify_trend(90.0, None, Some(100.0)), None);
    }

    #[test]
    fn trend_serializes_as_label() {
        let json = serde_json::to_string(&Trend::StrongUptrend).expect("serialize");
        assert_eq!(json, "\"Strong Uptrend\"");
    }

    #[test]
    fn relative_strength_needs_one_extra_point() {
        let stock: Vec<f64> = (0..22).map(|index| 100.0 + index as f64).collect();
        let flat = vec![50.0; 22];

        let values = relative_strength(&stock, &flat);
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].period, 21);
        assert!((values[0].relative_strength - 21.0).abs() < 1e-9);
        assert!(values[0].outperforming);

        assert!(relative_strength(&stock[..21], &flat).is_empty());
    }
}
