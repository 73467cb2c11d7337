use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use stockscope_core::{
    AlphaVantageAdapter, DatasetKind, FetchRequest, HttpClient, HttpError, HttpRequest,
    HttpResponse, PolygonAdapter, ProviderAdapter, ProviderId, ProviderPayload, ProviderResult,
    Symbol, YahooAdapter,
};

/// Answers every request with the same canned response.
struct CannedHttpClient {
    response: Result<HttpResponse, HttpError>,
    urls: Mutex<Vec<String>>,
}

impl CannedHttpClient {
    fn new(response: Result<HttpResponse, HttpError>) -> Arc<Self> {
        Arc::new(Self {
            response,
            urls: Mutex::new(Vec::new()),
        })
    }

    fn urls(&self) -> Vec<String> {
        self.urls.lock().expect("url log").clone()
    }
}

impl HttpClient for CannedHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        self.urls.lock().expect("url log").push(request.url.clone());
        let response = self.response.clone();
        Box::pin(async move { response })
    }
}

struct ProviderCase {
    id: ProviderId,
    quote_body: &'static str,
    build: fn(Arc<dyn HttpClient>) -> Arc<dyn ProviderAdapter>,
}

fn alphavantage(http: Arc<dyn HttpClient>) -> Arc<dyn ProviderAdapter> {
    Arc::new(AlphaVantageAdapter::new(http, "demo-key"))
}

fn yahoo(http: Arc<dyn HttpClient>) -> Arc<dyn ProviderAdapter> {
    Arc::new(YahooAdapter::new(http))
}

fn polygon(http: Arc<dyn HttpClient>) -> Arc<dyn ProviderAdapter> {
    Arc::new(PolygonAdapter::new(http, "demo-key"))
}

fn provider_cases() -> Vec<ProviderCase> {
    vec![
        ProviderCase {
            id: ProviderId::Alphavantage,
            quote_body: r#"{"Global Quote":{"01. symbol":"AAPL","05. price":"190.5000","06. volume":"1000","09. change":"1.5000","10. change percent":"0.7937%"}}"#,
            build: alphavantage,
        },
        ProviderCase {
            id: ProviderId::Yahoo,
            quote_body: r#"{"chart":{"result":[{"meta":{"symbol":"AAPL","regularMarketPrice":190.5,"chartPreviousClose":189.0,"regularMarketVolume":1000,"regularMarketTime":1704153600}}],"error":null}}"#,
            build: yahoo,
        },
        ProviderCase {
            id: ProviderId::Polygon,
            quote_body: r#"{"ticker":"AAPL","status":"OK","resultsCount":1,"results":[{"T":"AAPL","o":189.0,"h":191.0,"l":188.0,"c":190.5,"v":1000.0,"t":1704229200000}]}"#,
            build: polygon,
        },
    ]
}

fn quote_request() -> FetchRequest {
    FetchRequest::new(Symbol::parse("AAPL").expect("valid symbol"), DatasetKind::Quote)
}

#[tokio::test]
async fn quote_normalizes_for_all_providers() {
    for case in provider_cases() {
        // Given: an adapter whose upstream returns a well-formed quote body
        let http = CannedHttpClient::new(Ok(HttpResponse::ok_json(case.quote_body)));
        let adapter = (case.build)(http.clone());

        // When: a quote is fetched
        let result = adapter.fetch(quote_request()).await;

        // Then: the payload is a normalized quote for the requested symbol
        let quote = match result {
            ProviderResult::Success(ProviderPayload::Quote(quote)) => quote,
            other => panic!("provider '{}': expected a quote, got {other:?}", case.id),
        };
        assert_eq!(quote.symbol.as_str(), "AAPL", "provider '{}': symbol", case.id);
        assert!(
            (quote.price - 190.5).abs() < 1e-9,
            "provider '{}': price",
            case.id
        );
        assert_eq!(adapter.id(), case.id);
        assert_eq!(http.urls().len(), 1, "provider '{}': one upstream call", case.id);
    }
}

#[tokio::test]
async fn http_statuses_are_classified_for_all_providers() {
    for case in provider_cases() {
        for status in [404_u16, 429, 503] {
            // Given: an upstream answering with a bare status
            let http = CannedHttpClient::new(Ok(HttpResponse::with_status(status, "")));
            let adapter = (case.build)(http);

            // When: a quote is fetched
            let result = adapter.fetch(quote_request()).await;

            // Then: the status maps to one classification, never a raw error
            let classified = matches!(
                (status, &result),
                (404, ProviderResult::NotFound)
                    | (429, ProviderResult::RateLimited(_))
                    | (503, ProviderResult::TransientError(_))
            );
            assert!(
                classified,
                "provider '{}': status {status} classified as {result:?}",
                case.id
            );
        }
    }
}

#[tokio::test]
async fn retry_after_hint_is_carried_through() {
    for case in provider_cases() {
        let mut response = HttpResponse::with_status(429, "");
        response.retry_after_secs = Some(30);
        let adapter = (case.build)(CannedHttpClient::new(Ok(response)));

        let result = adapter.fetch(quote_request()).await;

        assert_eq!(
            result,
            ProviderResult::RateLimited(Some(Duration::from_secs(30))),
            "provider '{}'",
            case.id
        );
    }
}

#[tokio::test]
async fn transport_failures_and_garbage_bodies_are_transient() {
    for case in provider_cases() {
        let unreachable = (case.build)(CannedHttpClient::new(Err(HttpError::Connect(String::from("connection refused")))));
        let garbage = (case.build)(CannedHttpClient::new(Ok(HttpResponse::ok_json("<html>oops</html>"))));

        assert!(
            matches!(unreachable.fetch(quote_request()).await, ProviderResult::TransientError(_)),
            "provider '{}': transport failure",
            case.id
        );
        assert!(
            matches!(garbage.fetch(quote_request()).await, ProviderResult::TransientError(_)),
            "provider '{}': unparseable body",
            case.id
        );
    }
}

#[tokio::test]
async fn alphavantage_frequency_note_is_rate_limited() {
    // Given: Alpha Vantage answering 200 with its throttling note
    let http = CannedHttpClient::new(Ok(HttpResponse::ok_json(
        r#"{"Note":"Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute and 500 calls per day."}"#,
    )));
    let adapter = AlphaVantageAdapter::new(http, "demo-key");

    // When: a quote is fetched
    let result = adapter.fetch(quote_request()).await;

    // Then: the soft limit is reported as a rate limit, not as data
    assert!(matches!(result, ProviderResult::RateLimited(_)));
}

#[test]
fn capabilities_are_declared_per_provider() {
    let http: Arc<dyn HttpClient> = CannedHttpClient::new(Ok(HttpResponse::ok_json("{}")));

    for case in provider_cases() {
        let capabilities = (case.build)(http.clone()).capabilities();
        assert!(capabilities.supports(DatasetKind::Quote), "provider '{}'", case.id);
        assert!(capabilities.supports(DatasetKind::History), "provider '{}'", case.id);
        assert!(
            !capabilities.supports(DatasetKind::Indicators),
            "provider '{}': indicators are derived locally",
            case.id
        );
    }
}
