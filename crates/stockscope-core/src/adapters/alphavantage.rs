use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use time::macros::format_description;
use time::PrimitiveDateTime;
use tracing::warn;

use super::{parse_body, series_or_not_found, Upstream};
use crate::circuit_breaker::CircuitBreaker;
use crate::http_client::{HttpClient, HttpRequest};
use crate::normalize::{parse_number, parse_text};
use crate::provider::{
    CapabilitySet, FetchRequest, HealthStatus, ProviderAdapter, ProviderPayload, ProviderResult,
};
use crate::throttling::ThrottlingQueue;
use crate::{
    parse_date, DatasetKind, DateRange, HistoricalSeries, NewsItem, Overview, PricePoint,
    ProviderId, Quote, Symbol, UtcDateTime,
};

const BASE_URL: &str = "https://www.alphavantage.co/query";

/// Alpha Vantage adapter: quote, overview, daily history and news.
#[derive(Clone)]
pub struct AlphaVantageAdapter {
    upstream: Upstream,
    api_key: String,
}

impl AlphaVantageAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>, api_key: impl Into<String>) -> Self {
        Self {
            upstream: Upstream::new(ProviderId::Alphavantage, http_client),
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

    fn url(&self, function: &str, params: &[(&str, &str)]) -> String {
        let mut url = format!("{BASE_URL}?function={function}");
        for (name, value) in params {
            url.push_str(&format!("&{name}={}", urlencoding::encode(value)));
        }
        url.push_str(&format!("&apikey={}", urlencoding::encode(&self.api_key)));
        url
    }

    async fn call(&self, function: &str, params: &[(&str, &str)]) -> ProviderResult<String> {
        let request = HttpRequest::get(self.url(function, params));
        self.upstream.get(function, request).await
    }

    async fn fetch_dataset(&self, request: &FetchRequest) -> ProviderResult<ProviderPayload> {
        let symbol = request.symbol.as_str();
        match request.dataset {
            DatasetKind::Quote => {
                let body = self.call("GLOBAL_QUOTE", &[("symbol", symbol)]).await;
                body.and_then(|body| normalize_quote(&request.symbol, &body))
                    .map(ProviderPayload::Quote)
            }
            DatasetKind::Overview => {
                let body = self.call("OVERVIEW", &[("symbol", symbol)]).await;
                body.and_then(|body| normalize_overview(&request.symbol, &body))
                    .map(ProviderPayload::Overview)
            }
            DatasetKind::History => {
                let body = self
                    .call(
                        "TIME_SERIES_DAILY",
                        &[("symbol", symbol), ("outputsize", "full")],
                    )
                    .await;
                body.and_then(|body| {
                    normalize_history(&request.symbol, request.range.as_ref(), &body)
                })
                .map(ProviderPayload::History)
            }
            DatasetKind::News => {
                let body = self
                    .call("NEWS_SENTIMENT", &[("tickers", symbol), ("limit", "50")])
                    .await;
                body.and_then(|body| normalize_news(&body))
                    .map(ProviderPayload::News)
            }
            DatasetKind::Indicators => {
                ProviderResult::TransientError(String::from("unsupported dataset"))
            }
        }
    }
}

impl ProviderAdapter for AlphaVantageAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Alphavantage
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

/// Alpha Vantage answers 200 for every failure and explains in the body.
fn classify_notice<T>(value: &Value) -> Option<ProviderResult<T>> {
    let text = |key: &str| value.get(key).and_then(Value::as_str);

    if let Some(message) = text("Error Message") {
        if message.contains("Invalid API call") || message.contains("not found") {
            return Some(ProviderResult::NotFound);
        }
        return Some(ProviderResult::TransientError(format!(
            "alphavantage error: {message}"
        )));
    }

    for key in ["Note", "Information"] {
        if let Some(message) = text(key) {
            let lowered = message.to_ascii_lowercase();
            if lowered.contains("call frequency")
                || lowered.contains("rate limit")
                || lowered.contains("requests per day")
            {
                return Some(ProviderResult::RateLimited(Some(Duration::from_secs(60))));
            }
            warn!(notice = message, "alphavantage returned an informational notice");
            return Some(ProviderResult::TransientError(format!(
                "alphavantage notice: {message}"
            )));
        }
    }

    None
}

fn parse_checked<T, U>(body: &str) -> Result<T, ProviderResult<U>>
where
    T: serde::de::DeserializeOwned,
{
    let value: Value = parse_body(ProviderId::Alphavantage, body)?;
    if let Some(result) = classify_notice(&value) {
        return Err(result);
    }
    serde_json::from_value(value).map_err(|error| {
        ProviderResult::TransientError(format!("failed to parse alphavantage response: {error}"))
    })
}

#[derive(Debug, Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote", default)]
    quote: BTreeMap<String, String>,
}

fn normalize_quote(symbol: &Symbol, body: &str) -> ProviderResult<Quote> {
    let response: GlobalQuoteResponse = match parse_checked(body) {
        Ok(response) => response,
        Err(result) => return result,
    };
    let field = |key: &str| response.quote.get(key).map(String::as_str).unwrap_or("");

    let Some(price) = parse_number(field("05. price")) else {
        return ProviderResult::NotFound;
    };

    match Quote::new(
        symbol.clone(),
        price,
        parse_number(field("09. change")),
        parse_number(field("10. change percent")),
        parse_number(field("06. volume")).map(|volume| volume as u64),
        UtcDateTime::now(),
    ) {
        Ok(quote) => ProviderResult::Success(quote),
        Err(error) => ProviderResult::TransientError(format!("invalid alphavantage quote: {error}")),
    }
}

#[derive(Debug, Default, Deserialize)]
struct CompanyOverview {
    #[serde(rename = "Symbol")]
    symbol: Option<String>,
    #[serde(rename = "Name")]
    name: Option<String>,
    #[serde(rename = "Description")]
    description: Option<String>,
    #[serde(rename = "Sector")]
    sector: Option<String>,
    #[serde(rename = "Industry")]
    industry: Option<String>,
    #[serde(rename = "MarketCapitalization")]
    market_cap: Option<String>,
    #[serde(rename = "PERatio")]
    pe_ratio: Option<String>,
    #[serde(rename = "DividendYield")]
    dividend_yield: Option<String>,
    #[serde(rename = "52WeekHigh")]
    high_52w: Option<String>,
    #[serde(rename = "52WeekLow")]
    low_52w: Option<String>,
}

fn normalize_overview(symbol: &Symbol, body: &str) -> ProviderResult<Overview> {
    let raw: CompanyOverview = match parse_checked(body) {
        Ok(raw) => raw,
        Err(result) => return result,
    };
    if raw.symbol.as_deref().and_then(parse_text).is_none() {
        return ProviderResult::NotFound;
    }

    let number = |value: &Option<String>| value.as_deref().and_then(parse_number);
    let text = |value: &Option<String>| value.as_deref().and_then(parse_text);

    ProviderResult::Success(Overview {
        name: text(&raw.name),
        market_cap: number(&raw.market_cap),
        pe_ratio: number(&raw.pe_ratio),
        // Reported as a fraction; the domain carries percent.
        dividend_yield: number(&raw.dividend_yield).map(|value| value * 100.0),
        high_52w: number(&raw.high_52w),
        low_52w: number(&raw.low_52w),
        sector: text(&raw.sector),
        industry: text(&raw.industry),
        description: text(&raw.description),
        ..Overview::empty(symbol.clone())
    })
}

#[derive(Debug, Deserialize)]
struct DailySeriesResponse {
    #[serde(rename = "Time Series (Daily)")]
    series: Option<BTreeMap<String, DailyBar>>,
}

#[derive(Debug, Deserialize)]
struct DailyBar {
    #[serde(rename = "1. open")]
    open: String,
    #[serde(rename = "2. high")]
    high: String,
    #[serde(rename = "3. low")]
    low: String,
    #[serde(rename = "4. close")]
    close: String,
    #[serde(rename = "5. volume", default)]
    volume: Option<String>,
}

fn normalize_history(
    symbol: &Symbol,
    range: Option<&DateRange>,
    body: &str,
) -> ProviderResult<HistoricalSeries> {
    let response: DailySeriesResponse = match parse_checked(body) {
        Ok(response) => response,
        Err(result) => return result,
    };
    let Some(series) = response.series.filter(|series| !series.is_empty()) else {
        return ProviderResult::NotFound;
    };

    let points = series
        .into_iter()
        .filter_map(|(day, bar)| {
            let date = parse_date(&day).ok()?;
            if range.is_some_and(|range| !range.contains(date)) {
                return None;
            }
            PricePoint::new(
                date,
                parse_number(&bar.open)?,
                parse_number(&bar.high)?,
                parse_number(&bar.low)?,
                parse_number(&bar.close)?,
                bar.volume
                    .as_deref()
                    .and_then(parse_number)
                    .map_or(0, |volume| volume as u64),
            )
            .ok()
        })
        .collect();

    series_or_not_found(ProviderId::Alphavantage, symbol, points)
}

#[derive(Debug, Deserialize)]
struct NewsResponse {
    #[serde(default)]
    feed: Vec<NewsArticle>,
}

#[derive(Debug, Deserialize)]
struct NewsArticle {
    title: String,
    url: String,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    time_published: Option<String>,
}

fn normalize_news(body: &str) -> ProviderResult<Vec<NewsItem>> {
    let response: NewsResponse = match parse_checked(body) {
        Ok(response) => response,
        Err(result) => return result,
    };

    ProviderResult::Success(
        response
            .feed
            .into_iter()
            .map(|article| NewsItem {
                title: article.title,
                url: article.url,
                source: article.source.as_deref().and_then(parse_text),
                summary: article.summary.as_deref().and_then(parse_text),
                published_at: article.time_published.as_deref().and_then(parse_published),
            })
            .collect(),
    )
}

/// `20240102T153000`, always UTC.
fn parse_published(raw: &str) -> Option<UtcDateTime> {
    PrimitiveDateTime::parse(
        raw,
        format_description!("[year][month][day]T[hour][minute][second]"),
    )
    .ok()
    .map(|value| UtcDateTime::from_offset_datetime(value.assume_utc()))
}
