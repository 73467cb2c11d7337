mod alphavantage;
mod polygon;
mod yahoo;

use std::sync::Arc;

use tracing::debug;

pub use alphavantage::AlphaVantageAdapter;
pub use polygon::PolygonAdapter;
pub use yahoo::YahooAdapter;

use crate::circuit_breaker::{CircuitBreaker, CircuitState};
use crate::http_client::{HttpClient, HttpRequest};
use crate::provider::{HealthState, HealthStatus, ProviderResult};
use crate::provider_policy::ProviderPolicy;
use crate::throttling::ThrottlingQueue;
use crate::{HistoricalSeries, PricePoint, ProviderId, Symbol};

/// Transport guard shared by the adapters: circuit breaker, local rate budget
/// and HTTP status classification.
#[derive(Clone)]
struct Upstream {
    provider: ProviderId,
    http_client: Arc<dyn HttpClient>,
    circuit_breaker: Arc<CircuitBreaker>,
    throttling: ThrottlingQueue,
}

impl Upstream {
    fn new(provider: ProviderId, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            provider,
            http_client,
            circuit_breaker: Arc::new(CircuitBreaker::default()),
            throttling: ThrottlingQueue::from_policy(&ProviderPolicy::default_for(provider)),
        }
    }

    fn with_circuit_breaker(mut self, circuit_breaker: Arc<CircuitBreaker>) -> Self {
        self.circuit_breaker = circuit_breaker;
        self
    }

    fn with_throttling(mut self, throttling: ThrottlingQueue) -> Self {
        self.throttling = throttling;
        self
    }

    /// Issue `request` and return the body of a 2xx response.
    ///
    /// `label` names the call in logs; the URL may carry an API key and is
    /// never logged.
    async fn get(&self, label: &str, request: HttpRequest) -> ProviderResult<String> {
        let provider = self.provider;
        if let Err(remaining) = self.circuit_breaker.try_acquire() {
            return ProviderResult::TransientError(format!(
                "{provider} circuit breaker is open; retry in {:.0}s",
                remaining.as_secs_f64()
            ));
        }

        if let Err(delay) = self.throttling.acquire() {
            debug!(%provider, call = label, "local request budget exhausted");
            return ProviderResult::RateLimited(Some(delay));
        }

        let response = match self.http_client.execute(request).await {
            Ok(response) => response,
            Err(error) => {
                self.circuit_breaker.record_failure();
                return ProviderResult::TransientError(format!("{provider} {error}"));
            }
        };

        debug!(%provider, call = label, status = response.status, "upstream responded");
        match response.status {
            200..=299 => {
                self.circuit_breaker.record_success();
                ProviderResult::Success(response.body)
            }
            404 => {
                self.circuit_breaker.record_success();
                ProviderResult::NotFound
            }
            429 => ProviderResult::RateLimited(response.retry_after()),
            500..=599 => {
                self.circuit_breaker.record_failure();
                ProviderResult::TransientError(format!(
                    "{provider} upstream returned status {}",
                    response.status
                ))
            }
            status => ProviderResult::TransientError(format!(
                "{provider} rejected the request with status {status}"
            )),
        }
    }

    fn health(&self) -> HealthStatus {
        let rate_available = !self.throttling.is_saturated();
        match self.circuit_breaker.state() {
            CircuitState::Closed => HealthStatus::new(HealthState::Healthy, rate_available),
            CircuitState::HalfOpen => HealthStatus::new(HealthState::Degraded, rate_available),
            CircuitState::Open => HealthStatus::new(HealthState::Unhealthy, false),
        }
    }
}

/// Parse a JSON body, classifying garbage as a transient upstream fault.
fn parse_body<T: serde::de::DeserializeOwned, U>(
    provider: ProviderId,
    body: &str,
) -> Result<T, ProviderResult<U>> {
    serde_json::from_str(body).map_err(|error| {
        ProviderResult::TransientError(format!("failed to parse {provider} response: {error}"))
    })
}

/// Wrap normalized bars. A response whose rows were all unusable counts as
/// "no data here" so the chain can try the next provider.
fn series_or_not_found(
    provider: ProviderId,
    symbol: &Symbol,
    points: Vec<PricePoint>,
) -> ProviderResult<HistoricalSeries> {
    if points.is_empty() {
        debug!(%provider, %symbol, "history response held no usable bars");
        return ProviderResult::NotFound;
    }
    match HistoricalSeries::new(symbol.clone(), points) {
        Ok(series) => ProviderResult::Success(series),
        Err(error) => ProviderResult::TransientError(format!("invalid {provider} series: {error}")),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;

    use crate::http_client::{HttpClient, HttpError, HttpRequest, HttpResponse};

    /// Replays canned responses in order and records every request.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingHttpClient {
        responses: Mutex<VecDeque<Result<HttpResponse, HttpError>>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl RecordingHttpClient {
        pub(crate) fn replying(responses: Vec<Result<HttpResponse, HttpError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn json(body: &str) -> Self {
            Self::replying(vec![Ok(HttpResponse::ok_json(body))])
        }

        pub(crate) fn status(status: u16) -> Self {
            Self::replying(vec![Ok(HttpResponse::with_status(status, ""))])
        }

        pub(crate) fn recorded_requests(&self) -> Vec<HttpRequest> {
            self.requests
                .lock()
                .expect("request store should not be poisoned")
                .clone()
        }
    }

    impl HttpClient for RecordingHttpClient {
        fn execute<'a>(
            &'a self,
            request: HttpRequest,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
            self.requests
                .lock()
                .expect("request store should not be poisoned")
                .push(request);
            let response = self
                .responses
                .lock()
                .expect("response queue should not be poisoned")
                .pop_front()
                .unwrap_or_else(|| Err(HttpError::Request(String::from("no canned response left"))));
            Box::pin(async move { response })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingHttpClient;
    use super::*;
    use crate::circuit_breaker::CircuitBreakerConfig;
    use crate::http_client::HttpError;
    use std::time::Duration;

    fn upstream(client: RecordingHttpClient) -> Upstream {
        Upstream::new(ProviderId::Yahoo, Arc::new(client))
    }

    #[tokio::test]
    async fn classifies_http_statuses() {
        let request = || HttpRequest::get("https://example.test");

        assert_eq!(
            upstream(RecordingHttpClient::status(404)).get("t", request()).await,
            ProviderResult::NotFound
        );
        assert_eq!(
            upstream(RecordingHttpClient::status(429)).get("t", request()).await,
            ProviderResult::RateLimited(None)
        );
        assert!(matches!(
            upstream(RecordingHttpClient::status(503)).get("t", request()).await,
            ProviderResult::TransientError(_)
        ));
        assert_eq!(
            upstream(RecordingHttpClient::json("{}")).get("t", request()).await,
            ProviderResult::Success(String::from("{}"))
        );
    }

    #[tokio::test]
    async fn open_circuit_skips_the_transport() {
        let client = Arc::new(RecordingHttpClient::replying(vec![Err(HttpError::Connect(
            String::from("connection reset"),
        ))]));
        let guard = Upstream::new(ProviderId::Polygon, client.clone()).with_circuit_breaker(
            Arc::new(CircuitBreaker::new(CircuitBreakerConfig {
                failure_threshold: 1,
                open_timeout: Duration::from_secs(60),
            })),
        );

        let first = guard.get("t", HttpRequest::get("https://example.test")).await;
        let second = guard.get("t", HttpRequest::get("https://example.test")).await;

        assert!(matches!(first, ProviderResult::TransientError(_)));
        assert!(matches!(second, ProviderResult::TransientError(ref detail) if detail.contains("circuit breaker")));
        assert_eq!(client.recorded_requests().len(), 1);
        assert_eq!(guard.health().state, HealthState::Unhealthy);
    }
}
