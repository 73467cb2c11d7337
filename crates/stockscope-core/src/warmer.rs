//! Background cache pre-warming.

use serde::Serialize;
use tokio::task::{JoinError, JoinHandle};
use tracing::{info, warn};

use crate::service::MarketDataService;
use crate::Symbol;

/// A symbol the warmer could not fully load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WarmFailure {
    pub symbol: Symbol,
    pub dataset: &'static str,
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WarmReport {
    pub warmed: Vec<Symbol>,
    pub failures: Vec<WarmFailure>,
}

/// Handle to a running warm-up. Dropping it detaches the task.
#[derive(Debug)]
pub struct WarmHandle {
    task: JoinHandle<WarmReport>,
}

impl WarmHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the warm-up to finish.
    pub async fn report(self) -> Result<WarmReport, JoinError> {
        self.task.await
    }
}

/// Loads the record and history of each symbol so later requests hit the
/// cache. Failures are logged and collected, never raised.
pub struct CacheWarmer {
    service: MarketDataService,
}

impl CacheWarmer {
    pub fn new(service: MarketDataService) -> Self {
        Self { service }
    }

    pub fn spawn(self, symbols: Vec<Symbol>) -> WarmHandle {
        WarmHandle {
            task: tokio::spawn(async move { self.run(symbols).await }),
        }
    }

    async fn run(self, symbols: Vec<Symbol>) -> WarmReport {
        let mut report = WarmReport::default();

        for symbol in symbols {
            let mut ok = true;
            if let Err(error) = self.service.resolve(&symbol).await {
                warn!(%symbol, code = error.code(), "cache warm failed for quote");
                report.failures.push(WarmFailure {
                    symbol: symbol.clone(),
                    dataset: "quote",
                    code: error.code(),
                    message: error.to_string(),
                });
                ok = false;
            }
            if let Err(error) = self.service.history(&symbol, None).await {
                warn!(%symbol, code = error.code(), "cache warm failed for history");
                report.failures.push(WarmFailure {
                    symbol: symbol.clone(),
                    dataset: "history",
                    code: error.code(),
                    message: error.to_string(),
                });
                ok = false;
            }
            if ok {
                report.warmed.push(symbol);
            }
        }

        info!(
            warmed = report.warmed.len(),
            failed = report.failures.len(),
            "cache warm finished"
        );
        report
    }
}
