use stockscope_core::MarketDataService;

use crate::error::CliError;

use super::{parse_symbols, CommandResult};

/// Runs the warm-up to completion. Failed symbols become warnings.
pub async fn run(service: &MarketDataService, raw: &[String]) -> Result<CommandResult, CliError> {
    let symbols = parse_symbols(raw)?;

    let report = service.warm(symbols).report().await?;
    let warnings = report
        .failures
        .iter()
        .map(|failure| format!("{} {}: {}", failure.symbol, failure.dataset, failure.message))
        .collect();

    Ok(CommandResult::ok(serde_json::to_value(&report)?)
        .with_source_chain(service.provider_order())
        .with_warnings(warnings))
}
