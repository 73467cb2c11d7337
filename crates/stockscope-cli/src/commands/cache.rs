use serde::Serialize;
use stockscope_core::{MarketDataService, Symbol};

use crate::cli::ClearArgs;
use crate::error::CliError;
use crate::metadata::ErrorEntry;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct ClearResponseData {
    #[serde(skip_serializing_if = "Option::is_none")]
    symbol: Option<Symbol>,
    removed: usize,
}

pub async fn clear(service: &MarketDataService, args: &ClearArgs) -> Result<CommandResult, CliError> {
    let symbol = match (&args.symbol, args.all) {
        (Some(raw), false) => Some(Symbol::parse(raw)?),
        _ => None,
    };

    let outcome = match &symbol {
        Some(symbol) => service.clear(symbol).await,
        None => service.clear_all().await,
    };

    match outcome {
        Ok(removed) => Ok(CommandResult::ok(serde_json::to_value(ClearResponseData {
            symbol,
            removed,
        })?)),
        Err(error) => Ok(CommandResult::ok(serde_json::Value::Null).with_errors(vec![
            ErrorEntry::from_resolve(&error, symbol.as_ref().map(Symbol::as_str)),
        ])),
    }
}
