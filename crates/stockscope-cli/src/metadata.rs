use serde::Serialize;
use stockscope_core::{CacheStatus, ProviderId, ResolveError};

/// Metadata attached to every command response.
///
/// Field order is fixed to keep deterministic JSON serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub source_chain: Vec<ProviderId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provenance: Option<ProviderId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheStatus>,
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Structured error entry in a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEntry {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
}

impl ErrorEntry {
    pub fn from_resolve(error: &ResolveError, symbol: Option<&str>) -> Self {
        Self {
            code: error.code(),
            message: error.to_string(),
            symbol: symbol.map(str::to_owned),
        }
    }
}

/// Response envelope printed on stdout.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub meta: Metadata,
    pub data: T,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockscope_core::{DatasetKind, Symbol};

    #[test]
    fn envelope_omits_empty_sections() {
        let envelope = Envelope {
            meta: Metadata {
                source_chain: vec![ProviderId::Yahoo],
                provenance: Some(ProviderId::Yahoo),
                cache: Some(CacheStatus::Miss),
                latency_ms: 12,
                warnings: Vec::new(),
            },
            data: serde_json::json!({"price": 1.0}),
            errors: Vec::new(),
        };

        let encoded = serde_json::to_value(&envelope).expect("json");

        assert_eq!(encoded["meta"]["source_chain"], serde_json::json!(["yahoo"]));
        assert!(encoded["meta"].get("warnings").is_none());
        assert!(encoded.get("errors").is_none());
    }

    #[test]
    fn resolve_errors_keep_their_code() {
        let error = ResolveError::NotFound {
            symbol: Symbol::parse("ZZZZ").expect("symbol"),
            dataset: DatasetKind::Quote,
        };

        let entry = ErrorEntry::from_resolve(&error, Some("ZZZZ"));

        assert_eq!(entry.code, "resolve.not_found");
        assert_eq!(entry.symbol.as_deref(), Some("ZZZZ"));
    }
}
