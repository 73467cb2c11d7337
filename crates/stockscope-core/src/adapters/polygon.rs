use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;

use super::{parse_body, series_or_not_found, Upstream};
use crate::circuit_breaker::CircuitBreaker;
use crate::http_client::{HttpClient, HttpRequest};
use crate::normalize::parse_text;
use crate::provider::{
    CapabilitySet, FetchRequest, HealthStatus, ProviderAdapter, ProviderPayload, ProviderResult,
};
use crate::throttling::ThrottlingQueue;
use crate::{
    DatasetKind, DateRange, HistoricalSeries, NewsItem, Overview, PricePoint, ProviderId, Quote,
    Symbol, UtcDateTime,
};

const BASE_URL: &str = "https://api.polygon.io";
const DEFAULT_HISTORY_DAYS: u16 = 730;

/// Polygon.io adapter: previous-session quote, ticker reference, daily
/// aggregates and news.
#[derive(Clone)]
pub struct PolygonAdapter {
    upstream: Upstream,
    api_key: String,
}

impl PolygonAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>, api_key: impl Into<String>) -> Self {
        Self {
            upstream: Upstream::new(ProviderId::Polygon, http_client),
            api_key: api_key.into(),
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

    fn url(&self, path: &str, query: &str) -> String {
        let separator = if query.is_empty() { "" } else { "&" };
        format!(
            "{BASE_URL}{path}?{query}{separator}apiKey={}",
            urlencoding::encode(&self.api_key)
        )
    }

    async fn call(&self, label: &str, path: &str, query: &str) -> ProviderResult<String> {
        let request = HttpRequest::get(self.url(path, query));
        self.upstream.get(label, request).await
    }

    async fn fetch_dataset(&self, request: &FetchRequest) -> ProviderResult<ProviderPayload> {
        let ticker = urlencoding::encode(request.symbol.as_str()).into_owned();
        match request.dataset {
            DatasetKind::Quote => self
                .call(
                    "prev",
                    &format!("/v2/aggs/ticker/{ticker}/prev"),
                    "adjusted=true",
                )
                .await
                .and_then(|body| normalize_quote(&request.symbol, &body))
                .map(ProviderPayload::Quote),
            DatasetKind::Overview => self
                .call("ticker", &format!("/v3/reference/tickers/{ticker}"), "")
                .await
                .and_then(|body| normalize_overview(&request.symbol, &body))
                .map(ProviderPayload::Overview),
            DatasetKind::History => {
                let range = request.range.unwrap_or_else(|| {
                    DateRange::trailing_days(UtcDateTime::now().date(), DEFAULT_HISTORY_DAYS)
                });
                self.call(
                    "aggs",
                    &format!(
                        "/v2/aggs/ticker/{ticker}/range/1/day/{}/{}",
                        range.start, range.end
                    ),
                    "adjusted=true&sort=asc&limit=50000",
                )
                .await
                .and_then(|body| normalize_history(&request.symbol, &range, &body))
                .map(ProviderPayload::History)
            }
            DatasetKind::News => self
                .call(
                    "news",
                    "/v2/reference/news",
                    &format!("ticker={ticker}&limit=20"),
                )
                .await
                .and_then(|body| normalize_news(&body))
                .map(ProviderPayload::News),
            DatasetKind::Indicators => {
                ProviderResult::TransientError(String::from("unsupported dataset"))
            }
        }
    }
}

impl ProviderAdapter for PolygonAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Polygon
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::full()
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

#[derive(Debug, Deserialize)]
struct AggregatesResponse {
    #[serde(default)]
    results: Option<Vec<Aggregate>>,
}

#[derive(Debug, Deserialize)]
struct Aggregate {
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    #[serde(default)]
    v: Option<f64>,
    /// Session start, unix milliseconds.
    t: i64,
}

fn aggregates<U>(body: &str) -> Result<Vec<Aggregate>, ProviderResult<U>> {
    let response: AggregatesResponse = parse_body(ProviderId::Polygon, body)?;
    match response.results {
        Some(results) if !results.is_empty() => Ok(results),
        _ => Err(ProviderResult::NotFound),
    }
}

fn normalize_quote(symbol: &Symbol, body: &str) -> ProviderResult<Quote> {
    let bar = match aggregates(body) {
        Ok(mut results) => results.remove(0),
        Err(result) => return result,
    };

    let change = bar.c - bar.o;
    let percent_change = (bar.o != 0.0).then(|| change / bar.o * 100.0);
    let as_of = UtcDateTime::from_unix_millis(bar.t).unwrap_or_else(UtcDateTime::now);

    match Quote::new(
        symbol.clone(),
        bar.c,
        Some(change),
        percent_change,
        bar.v.map(|volume| volume as u64),
        as_of,
    ) {
        Ok(quote) => ProviderResult::Success(quote),
        Err(error) => ProviderResult::TransientError(format!("invalid polygon quote: {error}")),
    }
}

fn normalize_history(
    symbol: &Symbol,
    range: &DateRange,
    body: &str,
) -> ProviderResult<HistoricalSeries> {
    let bars = match aggregates(body) {
        Ok(results) => results,
        Err(result) => return result,
    };

    let points = bars
        .into_iter()
        .filter_map(|bar| {
            let date = UtcDateTime::from_unix_millis(bar.t)?.date();
            if !range.contains(date) {
                return None;
            }
            PricePoint::new(
                date,
                bar.o,
                bar.h,
                bar.l,
                bar.c,
                bar.v.map_or(0, |volume| volume as u64),
            )
            .ok()
        })
        .collect();

    series_or_not_found(ProviderId::Polygon, symbol, points)
}

#[derive(Debug, Deserialize)]
struct TickerResponse {
    #[serde(default)]
    results: Option<TickerDetails>,
}

#[derive(Debug, Deserialize)]
struct TickerDetails {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    market_cap: Option<f64>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    sic_description: Option<String>,
}

fn normalize_overview(symbol: &Symbol, body: &str) -> ProviderResult<Overview> {
    let response: TickerResponse = match parse_body(ProviderId::Polygon, body) {
        Ok(response) => response,
        Err(result) => return result,
    };
    let Some(details) = response.results else {
        return ProviderResult::NotFound;
    };

    ProviderResult::Success(Overview {
        name: details.name.as_deref().and_then(parse_text),
        market_cap: details.market_cap.filter(|value| value.is_finite()),
        industry: details.sic_description.as_deref().and_then(parse_text),
        description: details.description.as_deref().and_then(parse_text),
        ..Overview::empty(symbol.clone())
    })
}

#[derive(Debug, Deserialize)]
struct NewsResponse {
    #[serde(default)]
    results: Vec<NewsArticle>,
}

#[derive(Debug, Deserialize)]
struct NewsArticle {
    title: String,
    article_url: String,
    #[serde(default)]
    publisher: Option<Publisher>,
    #[serde(default)]
    published_utc: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Publisher {
    #[serde(default)]
    name: Option<String>,
}

fn normalize_news(body: &str) -> ProviderResult<Vec<NewsItem>> {
    let response: NewsResponse = match parse_body(ProviderId::Polygon, body) {
        Ok(response) => response,
        Err(result) => return result,
    };

    ProviderResult::Success(
        response
            .results
            .into_iter()
            .map(|article| NewsItem {
                title: article.title,
                url: article.article_url,
                source: article
                    .publisher
                    .and_then(|publisher| publisher.name)
                    .as_deref()
                    .and_then(parse_text),
                published_at: article
                    .published_utc
                    .as_deref()
                    .and_then(|raw| UtcDateTime::parse(raw).ok()),
                summary: article.description.as_deref().and_then(parse_text),
            })
            .collect(),
    )
}
