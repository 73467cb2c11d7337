use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Canonical provider identifiers used for provenance and chain ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Alphavantage,
    Yahoo,
    Polygon,
}

impl ProviderId {
    /// Default fallback order.
    pub const ALL: [Self; 3] = [Self::Alphavantage, Self::Yahoo, Self::Polygon];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Alphavantage => "alphavantage",
            Self::Yahoo => "yahoo",
            Self::Polygon => "polygon",
        }
    }

    /// Environment variables holding the API key, most specific first.
    /// Empty for providers that need no key.
    pub const fn api_key_vars(self) -> &'static [&'static str] {
        match self {
            Self::Alphavantage => &["STOCKSCOPE_ALPHAVANTAGE_API_KEY", "ALPHAVANTAGE_API_KEY"],
            Self::Polygon => &["STOCKSCOPE_POLYGON_API_KEY", "POLYGON_API_KEY"],
            Self::Yahoo => &[],
        }
    }

    pub const fn requires_api_key(self) -> bool {
        !self.api_key_vars().is_empty()
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "alphavantage" | "alpha_vantage" | "av" => Ok(Self::Alphavantage),
            "yahoo" => Ok(Self::Yahoo),
            "polygon" => Ok(Self::Polygon),
            other => Err(ValidationError::InvalidProvider {
                value: other.to_owned(),
            }),
        }
    }
}

/// Parse a comma separated provider order, dropping duplicates.
pub fn parse_provider_order(value: &str) -> Result<Vec<ProviderId>, ValidationError> {
    let mut order = Vec::new();
    for part in value.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        let provider = part.parse::<ProviderId>()?;
        if !order.contains(&provider) {
            order.push(provider);
        }
    }
    Ok(order)
}
