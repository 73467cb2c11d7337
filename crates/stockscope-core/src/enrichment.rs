//! Supplementary descriptive fields from a best-effort collaborator.
//!
//! Enrichment only fills gaps: a field is taken from the [`EnrichmentRecord`]
//! when the provider left it `None`, which includes provider sentinels such as
//! `"None"` or `"-"` already normalized away. A present provider value always
//! wins.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::normalize::{parse_number, parse_text};
use crate::{Overview, Symbol};

/// Raw strings as scraped; normalized only when merged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentRecord {
    pub description: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub market_cap: Option<String>,
    pub pe_ratio: Option<String>,
    pub high_52w: Option<String>,
    pub low_52w: Option<String>,
}

impl EnrichmentRecord {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Source of supplementary fields. Never fails: any problem yields an empty
/// record.
pub trait EnrichmentSource: Send + Sync {
    fn fetch<'a>(
        &'a self,
        symbol: &'a Symbol,
    ) -> Pin<Box<dyn Future<Output = EnrichmentRecord> + Send + 'a>>;
}

/// Contributes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEnrichment;

impl EnrichmentSource for NoopEnrichment {
    fn fetch<'a>(
        &'a self,
        _symbol: &'a Symbol,
    ) -> Pin<Box<dyn Future<Output = EnrichmentRecord> + Send + 'a>> {
        Box::pin(async { EnrichmentRecord::default() })
    }
}

/// Fixed records keyed by symbol.
#[derive(Debug, Clone, Default)]
pub struct StaticEnrichment {
    records: HashMap<Symbol, EnrichmentRecord>,
}

impl StaticEnrichment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(mut self, symbol: Symbol, record: EnrichmentRecord) -> Self {
        self.records.insert(symbol, record);
        self
    }
}

impl EnrichmentSource for StaticEnrichment {
    fn fetch<'a>(
        &'a self,
        symbol: &'a Symbol,
    ) -> Pin<Box<dyn Future<Output = EnrichmentRecord> + Send + 'a>> {
        let record = self.records.get(symbol).cloned().unwrap_or_default();
        Box::pin(async move { record })
    }
}

/// Fill `None` fields of `overview` from `record`. Returns the names of the
/// fields that were filled.
pub fn merge_overview(overview: &mut Overview, record: &EnrichmentRecord) -> Vec<&'static str> {
    let mut filled = Vec::new();

    fill(&mut overview.description, &record.description, parse_text, "description", &mut filled);
    fill(&mut overview.sector, &record.sector, parse_text, "sector", &mut filled);
    fill(&mut overview.industry, &record.industry, parse_text, "industry", &mut filled);
    fill(&mut overview.market_cap, &record.market_cap, parse_number, "market_cap", &mut filled);
    fill(&mut overview.pe_ratio, &record.pe_ratio, parse_number, "pe_ratio", &mut filled);
    fill(&mut overview.high_52w, &record.high_52w, parse_number, "high_52w", &mut filled);
    fill(&mut overview.low_52w, &record.low_52w, parse_number, "low_52w", &mut filled);

    filled
}

fn fill<T>(
    target: &mut Option<T>,
    candidate: &Option<String>,
    parse: fn(&str) -> Option<T>,
    name: &'static str,
    filled: &mut Vec<&'static str>,
) {
    if target.is_some() {
        return;
    }
    if let Some(value) = candidate.as_deref().and_then(parse) {
        *target = Some(value);
        filled.push(name);
    }
}
