use serde::Serialize;
use stockscope_core::{MarketDataService, ProviderId, SourceSnapshot};

use crate::error::CliError;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct SourceEntry {
    id: ProviderId,
    priority: usize,
    available: bool,
    status: &'static str,
    datasets: Vec<&'static str>,
}

impl SourceEntry {
    fn new(priority: usize, snapshot: SourceSnapshot) -> Self {
        Self {
            id: snapshot.id,
            priority,
            available: snapshot.available(),
            status: snapshot.status_label(),
            datasets: snapshot.capabilities.supported_datasets(),
        }
    }
}

#[derive(Debug, Serialize)]
struct SourcesResponseData {
    benchmark: String,
    sources: Vec<SourceEntry>,
}

pub async fn run(service: &MarketDataService) -> Result<CommandResult, CliError> {
    let sources: Vec<SourceEntry> = service
        .sources()
        .await
        .into_iter()
        .enumerate()
        .map(|(index, snapshot)| SourceEntry::new(index + 1, snapshot))
        .collect();

    let warnings = if sources.is_empty() {
        vec![String::from("no provider configured")]
    } else {
        Vec::new()
    };

    Ok(CommandResult::ok(serde_json::to_value(SourcesResponseData {
        benchmark: service.benchmark().to_string(),
        sources,
    })?)
    .with_source_chain(service.provider_order())
    .with_warnings(warnings))
}
