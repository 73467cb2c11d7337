use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;
use time::{OffsetDateTime, Time};

use super::{parse_body, series_or_not_found, Upstream};
use crate::circuit_breaker::CircuitBreaker;
use crate::http_client::{HttpClient, HttpRequest};
use crate::provider::{
    CapabilitySet, FetchRequest, HealthStatus, ProviderAdapter, ProviderPayload, ProviderResult,
};
use crate::throttling::ThrottlingQueue;
use crate::{
    DatasetKind, DateRange, HistoricalSeries, PricePoint, ProviderId, Quote, Symbol, UtcDateTime,
};

const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// Yahoo Finance chart API adapter. Needs no credentials; serves quotes and
/// daily history only.
#[derive(Clone)]
pub struct YahooAdapter {
    upstream: Upstream,
}

impl YahooAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            upstream: Upstream::new(ProviderId::Yahoo, http_client),
        }
    }

    pub fn with_circuit_breaker(mut self, circuit_breaker: Arc<CircuitBreaker>) -> Self {
        self.upstream = self.upstream.with_circuit_breaker(circuit_breaker);
        self
    }

    pub fn with_throttling(mut self, throttling: ThrottlingQueue) -> Self {
        self.upstream = self.upstream.with_throttling(throttling);
        self
    }

    async fn chart(&self, symbol: &Symbol, query: String) -> ProviderResult<String> {
        let url = format!(
            "{CHART_URL}/{}?{query}",
            urlencoding::encode(symbol.as_str())
        );
        let request = HttpRequest::get(url).with_header("accept", "application/json");
        self.upstream.get("chart", request).await
    }

    async fn fetch_dataset(&self, request: &FetchRequest) -> ProviderResult<ProviderPayload> {
        match request.dataset {
            DatasetKind::Quote => self
                .chart(&request.symbol, String::from("range=5d&interval=1d"))
                .await
                .and_then(|body| normalize_quote(&request.symbol, &body))
                .map(ProviderPayload::Quote),
            DatasetKind::History => {
                let query = match request.range {
                    Some(range) => format!(
                        "period1={}&period2={}&interval=1d&events=history",
                        day_start(range.start),
                        day_start(range.end) + 86_400
                    ),
                    None => String::from("range=2y&interval=1d&events=history"),
                };
                self.chart(&request.symbol, query)
                    .await
                    .and_then(|body| {
                        normalize_history(&request.symbol, request.range.as_ref(), &body)
                    })
                    .map(ProviderPayload::History)
            }
            DatasetKind::Overview | DatasetKind::News | DatasetKind::Indicators => {
                ProviderResult::TransientError(String::from("unsupported dataset"))
            }
        }
    }
}

impl ProviderAdapter for YahooAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Yahoo
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::new(true, false, true, false)
    }

    fn fetch<'a>(
        &'a self,
        request: FetchRequest,
    ) -> Pin<Box<dyn Future<Output = ProviderResult<ProviderPayload>> + Send + 'a>> {
        Box::pin(async move { self.fetch_dataset(&request).await })
    }

    fn health<'a>(&'a self) -> Pin<Box<dyn Future<Output = HealthStatus> + Send + 'a>> {
        Box::pin(async move { self.upstream.health() })
    }
}

fn day_start(date: time::Date) -> i64 {
    date.with_time(Time::MIDNIGHT).assume_utc().unix_timestamp()
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    #[serde(default)]
    indicators: Option<ChartIndicators>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    #[serde(default)]
    regular_market_price: Option<f64>,
    #[serde(default)]
    chart_previous_close: Option<f64>,
    #[serde(default)]
    previous_close: Option<f64>,
    #[serde(default)]
    regular_market_volume: Option<u64>,
    #[serde(default)]
    regular_market_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

/// Columns are parallel to `timestamp`; Yahoo pads missing sessions with nulls.
#[derive(Debug, Default, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

fn first_result<U>(body: &str) -> Result<ChartResult, ProviderResult<U>> {
    let envelope: ChartEnvelope = parse_body(ProviderId::Yahoo, body)?;
    if let Some(error) = envelope.chart.error {
        if error.code.eq_ignore_ascii_case("Not Found") {
            return Err(ProviderResult::NotFound);
        }
        return Err(ProviderResult::TransientError(format!(
            "yahoo chart error {}: {}",
            error.code,
            error.description.unwrap_or_default()
        )));
    }

    envelope
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .ok_or(ProviderResult::NotFound)
}

fn normalize_quote(symbol: &Symbol, body: &str) -> ProviderResult<Quote> {
    let meta = match first_result(body) {
        Ok(result) => result.meta,
        Err(result) => return result,
    };
    let Some(price) = meta.regular_market_price else {
        return ProviderResult::NotFound;
    };

    let previous = meta.chart_previous_close.or(meta.previous_close);
    let change = previous.map(|previous| price - previous);
    let percent_change = previous
        .filter(|previous| *previous != 0.0)
        .map(|previous| (price - previous) / previous * 100.0);
    let as_of = meta
        .regular_market_time
        .and_then(UtcDateTime::from_unix_seconds)
        .unwrap_or_else(UtcDateTime::now);

    match Quote::new(
        symbol.clone(),
        price,
        change,
        percent_change,
        meta.regular_market_volume,
        as_of,
    ) {
        Ok(quote) => ProviderResult::Success(quote),
        Err(error) => ProviderResult::TransientError(format!("invalid yahoo quote: {error}")),
    }
}

fn normalize_history(
    symbol: &Symbol,
    range: Option<&DateRange>,
    body: &str,
) -> ProviderResult<HistoricalSeries> {
    let result = match first_result(body) {
        Ok(result) => result,
        Err(result) => return result,
    };
    if result.timestamp.is_empty() {
        return ProviderResult::NotFound;
    }

    let columns = result
        .indicators
        .and_then(|indicators| indicators.quote.into_iter().next())
        .unwrap_or_default();
    let cell = |column: &[Option<f64>], index: usize| column.get(index).copied().flatten();

    let mut points: Vec<PricePoint> = Vec::with_capacity(result.timestamp.len());
    for (index, seconds) in result.timestamp.iter().enumerate() {
        let Ok(moment) = OffsetDateTime::from_unix_timestamp(*seconds) else {
            continue;
        };
        let date = moment.date();
        if range.is_some_and(|range| !range.contains(date)) {
            continue;
        }
        let (Some(open), Some(high), Some(low), Some(close)) = (
            cell(&columns.open, index),
            cell(&columns.high, index),
            cell(&columns.low, index),
            cell(&columns.close, index),
        ) else {
            continue;
        };
        let volume = columns.volume.get(index).copied().flatten().unwrap_or(0);

        // Intraday refreshes can repeat the current session; keep the latest.
        if points.last().is_some_and(|last| last.date == date) {
            points.pop();
        }
        if let Ok(point) = PricePoint::new(date, open, high, low, close, volume) {
            points.push(point);
        }
    }

    series_or_not_found(ProviderId::Yahoo, symbol, points)
}
