use stockscope_core::{parse_date, DateRange, MarketDataService, Symbol};

use crate::cli::HistoryArgs;
use crate::error::CliError;

use super::CommandResult;

pub async fn run(service: &MarketDataService, args: &HistoryArgs) -> Result<CommandResult, CliError> {
    let symbol = Symbol::parse(&args.symbol)?;
    let range = match (&args.start, &args.end) {
        (Some(start), Some(end)) => Some(DateRange::new(parse_date(start)?, parse_date(end)?)?),
        _ => None,
    };

    match service.history(&symbol, range).await {
        Ok(resolved) => {
            Ok(CommandResult::ok(serde_json::to_value(&resolved.data)?).with_resolution(&resolved))
        }
        Err(error) => Ok(CommandResult::failed(&error, &symbol)),
    }
}

pub async fn news(service: &MarketDataService, raw: &str) -> Result<CommandResult, CliError> {
    let symbol = Symbol::parse(raw)?;

    match service.news(&symbol).await {
        Ok(resolved) => {
            Ok(CommandResult::ok(serde_json::to_value(&resolved.data)?).with_resolution(&resolved))
        }
        Err(error) => Ok(CommandResult::failed(&error, &symbol)),
    }
}
