//! Fakes and fixtures shared by the behavior tests.

#![allow(dead_code)]

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use stockscope_core::{
    CapabilitySet, DatasetKind, FetchRequest, HistoricalSeries, Overview, PricePoint,
    ProviderAdapter, ProviderId, ProviderPayload, ProviderResult, Quote, Symbol, UtcDateTime,
};
use time::macros::date;

type Responder = dyn Fn(&FetchRequest) -> ProviderResult<ProviderPayload> + Send + Sync;

/// Provider whose answers are computed from the request and whose calls are
/// counted.
pub struct FakeAdapter {
    id: ProviderId,
    capabilities: CapabilitySet,
    delay: Duration,
    calls: AtomicUsize,
    respond: Box<Responder>,
}

impl FakeAdapter {
    pub fn new(
        id: ProviderId,
        respond: impl Fn(&FetchRequest) -> ProviderResult<ProviderPayload> + Send + Sync + 'static,
    ) -> Self {
        Self {
            id,
            capabilities: CapabilitySet::full(),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            respond: Box::new(respond),
        }
    }

    /// Serves every dataset with fixture data for any symbol.
    pub fn healthy(id: ProviderId, price: f64) -> Self {
        Self::new(id, move |request| ProviderResult::Success(payload_for(request, price)))
    }

    /// First call succeeds, every later call fails transiently.
    pub fn succeeds_once(id: ProviderId, price: f64) -> Self {
        let answered = AtomicUsize::new(0);
        Self::new(id, move |request| {
            if answered.fetch_add(1, Ordering::SeqCst) == 0 {
                ProviderResult::Success(payload_for(request, price))
            } else {
                ProviderResult::TransientError(String::from("upstream down"))
            }
        })
    }

    pub fn always(id: ProviderId, result: ProviderResult<ProviderPayload>) -> Self {
        Self::new(id, move |_| result.clone())
    }

    pub fn with_capabilities(mut self, capabilities: CapabilitySet) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ProviderAdapter for FakeAdapter {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn capabilities(&self) -> CapabilitySet {
        self.capabilities
    }

    fn fetch<'a>(
        &'a self,
        request: FetchRequest,
    ) -> Pin<Box<dyn Future<Output = ProviderResult<ProviderPayload>> + Send + 'a>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let result = (self.respond)(&request);
        let delay = self.delay;
        Box::pin(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            result
        })
    }
}

pub fn symbol(value: &str) -> Symbol {
    Symbol::parse(value).expect("valid symbol")
}

pub fn adapters(list: &[Arc<FakeAdapter>]) -> Vec<Arc<dyn ProviderAdapter>> {
    list.iter()
        .map(|adapter| adapter.clone() as Arc<dyn ProviderAdapter>)
        .collect()
}

pub fn quote(symbol: &Symbol, price: f64) -> Quote {
    Quote::new(
        symbol.clone(),
        price,
        Some(1.25),
        Some(0.5),
        Some(1_000_000),
        UtcDateTime::now(),
    )
    .expect("valid quote")
}

pub fn overview(symbol: &Symbol) -> Overview {
    Overview {
        name: Some(format!("{symbol} Inc.")),
        sector: Some(String::from("Technology")),
        market_cap: Some(2.5e12),
        ..Overview::empty(symbol.clone())
    }
}

/// `closes` mapped onto consecutive days from 2023-01-02, with a one point
/// high/low band and rising volume.
pub fn series(symbol: &Symbol, closes: &[f64]) -> HistoricalSeries {
    let start = date!(2023 - 01 - 02);
    let points = closes
        .iter()
        .enumerate()
        .map(|(index, close)| {
            PricePoint::new(
                start + time::Duration::days(index as i64),
                *close,
                close + 1.0,
                (close - 1.0).max(0.0),
                *close,
                1_000 + index as u64,
            )
            .expect("valid point")
        })
        .collect();
    HistoricalSeries::new(symbol.clone(), points).expect("valid series")
}

/// Steadily rising closes starting at `start`.
pub fn rising(symbol: &Symbol, start: f64, len: usize) -> HistoricalSeries {
    let closes: Vec<f64> = (0..len).map(|index| start + index as f64 * 0.5).collect();
    series(symbol, &closes)
}

pub fn payload_for(request: &FetchRequest, price: f64) -> ProviderPayload {
    let symbol = &request.symbol;
    match request.dataset {
        DatasetKind::Quote => ProviderPayload::Quote(quote(symbol, price)),
        DatasetKind::Overview => ProviderPayload::Overview(overview(symbol)),
        DatasetKind::History | DatasetKind::Indicators => {
            ProviderPayload::History(rising(symbol, price, 260))
        }
        DatasetKind::News => ProviderPayload::News(Vec::new()),
    }
}
