//! Rolling-window indicators over daily points.
//!
//! Every series function returns one entry per input point; an entry is
//! `None` until its window is full.

use crate::PricePoint;

pub const SMA_WINDOWS: [usize; 3] = [20, 50, 200];
pub const RSI_PERIOD: usize = 14;
pub const ATR_PERIOD: usize = 14;
pub const VOLUME_WINDOW: usize = 20;

/// Mean of each trailing `window` values.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut means = vec![None; values.len()];
    if window == 0 || values.len() < window {
        return means;
    }

    let mut sum: f64 = values[..window].iter().sum();
    means[window - 1] = Some(sum / window as f64);
    for index in window..values.len() {
        sum += values[index] - values[index - window];
        means[index] = Some(sum / window as f64);
    }
    means
}

/// Simple moving average of closes.
pub fn sma(closes: &[f64], window: usize) -> Vec<Option<f64>> {
    rolling_mean(closes, window)
}

/// Relative strength index with simple rolling means of gains and losses.
///
/// The first point has no predecessor and contributes a zero delta, so the
/// first value lands on point `period`.
pub fn rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut gains = Vec::with_capacity(closes.len());
    let mut losses = Vec::with_capacity(closes.len());
    for (index, close) in closes.iter().enumerate() {
        let delta = if index == 0 {
            0.0
        } else {
            close - closes[index - 1]
        };
        gains.push(delta.max(0.0));
        losses.push((-delta).max(0.0));
    }

    rolling_mean(&gains, period)
        .into_iter()
        .zip(rolling_mean(&losses, period))
        .map(|(gain, loss)| match (gain, loss) {
            (Some(_), Some(loss)) if loss == 0.0 => Some(100.0),
            (Some(gain), Some(loss)) => Some(100.0 - 100.0 / (1.0 + gain / loss)),
            _ => None,
        })
        .collect()
}

/// True range per point; the first point uses its own high-low span.
pub fn true_range(points: &[PricePoint]) -> Vec<f64> {
    points
        .iter()
        .enumerate()
        .map(|(index, point)| {
            let span = point.high - point.low;
            match index.checked_sub(1).map(|previous| points[previous].close) {
                Some(previous_close) => span
                    .max((point.high - previous_close).abs())
                    .max((point.low - previous_close).abs()),
                None => span,
            }
        })
        .collect()
}

/// Average true range.
pub fn atr(points: &[PricePoint], period: usize) -> Vec<Option<f64>> {
    rolling_mean(&true_range(points), period)
}

/// Last volume divided by the mean of the trailing `window` volumes,
/// the last one included. `None` on a short series or a zero mean.
pub fn volume_ratio(volumes: &[u64], window: usize) -> Option<f64> {
    let average = average_volume(volumes, window)?;
    let current = *volumes.last()? as f64;
    (average > 0.0).then(|| current / average)
}

pub fn average_volume(volumes: &[u64], window: usize) -> Option<f64> {
    if window == 0 || volumes.len() < window {
        return None;
    }
    let trailing = &volumes[volumes.len() - window..];
    Some(trailing.iter().map(|volume| *volume as f64).sum::<f64>() / window as f64)
}
