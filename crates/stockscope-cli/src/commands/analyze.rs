use stockscope_core::{MarketDataService, Symbol};

use crate::cli::AnalyzeArgs;
use crate::error::CliError;

use super::CommandResult;

pub async fn run(service: &MarketDataService, args: &AnalyzeArgs) -> Result<CommandResult, CliError> {
    let symbol = Symbol::parse(&args.symbol)?;

    match service.analyze_with_lookback(&symbol, args.lookback).await {
        Ok(snapshot) => {
            let warnings = snapshot
                .insufficient_history
                .iter()
                .map(|indicator| format!("insufficient history for {indicator}"))
                .collect();
            Ok(CommandResult::ok(serde_json::to_value(&snapshot)?).with_warnings(warnings))
        }
        Err(error) => Ok(CommandResult::failed(&error, &symbol)),
    }
}
