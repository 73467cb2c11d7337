use serde::Serialize;
use stockscope_core::{MarketDataService, StockRecord, Symbol};

use crate::error::CliError;
use crate::metadata::ErrorEntry;

use super::{parse_symbols, CommandResult};

pub async fn run(service: &MarketDataService, raw: &str) -> Result<CommandResult, CliError> {
    let symbol = Symbol::parse(raw)?;

    match service.resolve(&symbol).await {
        Ok(record) => {
            let mut source_chain = vec![record.provenance];
            source_chain.extend(
                record
                    .overview_provenance
                    .filter(|provider| *provider != record.provenance),
            );
            let warnings = record.warnings.clone();
            Ok(CommandResult::ok(serde_json::to_value(&record)?)
                .with_source_chain(source_chain)
                .with_provenance(record.provenance, record.cache)
                .with_warnings(warnings))
        }
        Err(error) => Ok(CommandResult::failed(&error, &symbol)),
    }
}

#[derive(Debug, Serialize)]
struct ListResponseData {
    records: Vec<StockRecord>,
}

pub async fn list(service: &MarketDataService, raw: &[String]) -> Result<CommandResult, CliError> {
    let symbols = parse_symbols(raw)?;

    let mut records = Vec::with_capacity(symbols.len());
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    for (symbol, outcome) in service.list(&symbols).await {
        match outcome {
            Ok(record) => {
                warnings.extend(
                    record
                        .warnings
                        .iter()
                        .map(|warning| format!("{symbol}: {warning}")),
                );
                records.push(record);
            }
            Err(error) => errors.push(ErrorEntry::from_resolve(&error, Some(symbol.as_str()))),
        }
    }

    let mut source_chain = Vec::new();
    for record in &records {
        if !source_chain.contains(&record.provenance) {
            source_chain.push(record.provenance);
        }
    }

    Ok(CommandResult::ok(serde_json::to_value(ListResponseData { records })?)
        .with_source_chain(source_chain)
        .with_warnings(warnings)
        .with_errors(errors))
}
