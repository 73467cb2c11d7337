use serde::{Deserialize, Serialize};
use time::Date;

use crate::{DateRange, ProviderId, Symbol, UtcDateTime, ValidationError};

/// Point-in-time quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: Symbol,
    pub price: f64,
    pub change: Option<f64>,
    pub percent_change: Option<f64>,
    pub volume: Option<u64>,
    pub as_of: UtcDateTime,
}

impl Quote {
    pub fn new(
        symbol: Symbol,
        price: f64,
        change: Option<f64>,
        percent_change: Option<f64>,
        volume: Option<u64>,
        as_of: UtcDateTime,
    ) -> Result<Self, ValidationError> {
        validate_non_negative("price", price)?;
        validate_optional_finite("change", change)?;
        validate_optional_finite("percent_change", percent_change)?;

        Ok(Self {
            symbol,
            price,
            change,
            percent_change,
            volume,
            as_of,
        })
    }
}

/// Company overview. `None` is the only representation of an unknown value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overview {
    pub symbol: Symbol,
    pub name: Option<String>,
    pub market_cap: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub high_52w: Option<f64>,
    pub low_52w: Option<f64>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub description: Option<String>,
    /// Fields filled by the enrichment collaborator rather than the provider.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enriched_fields: Vec<String>,
}

impl Overview {
    pub fn empty(symbol: Symbol) -> Self {
        Self {
            symbol,
            name: None,
            market_cap: None,
            pe_ratio: None,
            dividend_yield: None,
            high_52w: None,
            low_52w: None,
            sector: None,
            industry: None,
            description: None,
            enriched_fields: Vec::new(),
        }
    }

    /// True when the provider returned nothing but the symbol.
    pub fn is_blank(&self) -> bool {
        self.name.is_none()
            && self.market_cap.is_none()
            && self.pe_ratio.is_none()
            && self.sector.is_none()
            && self.description.is_none()
    }
}

/// One daily OHLCV observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: Date,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl PricePoint {
    pub fn new(
        date: Date,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: u64,
    ) -> Result<Self, ValidationError> {
        validate_non_negative("open", open)?;
        validate_non_negative("high", high)?;
        validate_non_negative("low", low)?;
        validate_non_negative("close", close)?;
        if high < low {
            return Err(ValidationError::InvalidPriceRange);
        }

        Ok(Self {
            date,
            open,
            high,
            low,
            close,
            volume,
        })
    }
}

/// Daily price history, strictly ascending by date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSeries")]
pub struct HistoricalSeries {
    symbol: Symbol,
    points: Vec<PricePoint>,
}

#[derive(Deserialize)]
struct RawSeries {
    symbol: Symbol,
    points: Vec<PricePoint>,
}

impl TryFrom<RawSeries> for HistoricalSeries {
    type Error = ValidationError;

    fn try_from(value: RawSeries) -> Result<Self, Self::Error> {
        Self::new(value.symbol, value.points)
    }
}

impl HistoricalSeries {
    /// Sorts `points` by date. Gaps are allowed, repeated dates are not.
    pub fn new(symbol: Symbol, mut points: Vec<PricePoint>) -> Result<Self, ValidationError> {
        points.sort_by_key(|point| point.date);
        if let Some(pair) = points.windows(2).find(|pair| pair[0].date == pair[1].date) {
            return Err(ValidationError::DuplicateDate {
                date: pair[0].date.to_string(),
            });
        }
        Ok(Self { symbol, points })
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|point| point.close).collect()
    }

    /// Points falling inside `range`.
    pub fn within(&self, range: &DateRange) -> Self {
        Self {
            symbol: self.symbol.clone(),
            points: self
                .points
                .iter()
                .filter(|point| range.contains(point.date))
                .copied()
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub url: String,
    pub source: Option<String>,
    pub published_at: Option<UtcDateTime>,
    pub summary: Option<String>,
}

/// How a resolved value was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStatus {
    Hit,
    #[default]
    Miss,
    /// Served past its TTL because every provider failed.
    Stale,
}

/// Quote and overview merged into one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockRecord {
    pub symbol: Symbol,
    pub name: Option<String>,
    pub price: f64,
    pub change: Option<f64>,
    pub percent_change: Option<f64>,
    pub volume: Option<u64>,
    pub market_cap: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub high_52w: Option<f64>,
    pub low_52w: Option<f64>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub description: Option<String>,
    pub as_of: UtcDateTime,
    /// Provider that produced the quote.
    pub provenance: ProviderId,
    pub overview_provenance: Option<ProviderId>,
    pub enriched_fields: Vec<String>,
    pub cache: CacheStatus,
    pub warnings: Vec<String>,
}

impl StockRecord {
    pub fn assemble(quote: Quote, provenance: ProviderId, overview: Option<(Overview, ProviderId)>) -> Self {
        let (overview, overview_provenance) = match overview {
            Some((overview, provider)) => (overview, Some(provider)),
            None => (Overview::empty(quote.symbol.clone()), None),
        };

        Self {
            symbol: quote.symbol,
            name: overview.name,
            price: quote.price,
            change: quote.change,
            percent_change: quote.percent_change,
            volume: quote.volume,
            market_cap: overview.market_cap,
            pe_ratio: overview.pe_ratio,
            dividend_yield: overview.dividend_yield,
            high_52w: overview.high_52w,
            low_52w: overview.low_52w,
            sector: overview.sector,
            industry: overview.industry,
            description: overview.description,
            as_of: quote.as_of,
            provenance,
            overview_provenance,
            enriched_fields: overview.enriched_fields,
            cache: CacheStatus::Miss,
            warnings: Vec::new(),
        }
    }
}

fn validate_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}

fn validate_optional_finite(field: &'static str, value: Option<f64>) -> Result<(), ValidationError> {
    match value {
        Some(value) if !value.is_finite() => Err(ValidationError::NonFiniteValue { field }),
        _ => Ok(()),
    }
}
