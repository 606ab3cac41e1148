use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::provider::RawRecord;

/// One of the two marketplaces being compared.
///
/// Market A is where vehicles are bought (Germany, mobile.de), market B is the
/// reference market they are compared against (France, leboncoin).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Market {
    A,
    B,
}

impl Market {
    pub fn label(&self) -> &'static str {
        match self {
            Market::A => "mobile.de",
            Market::B => "leboncoin",
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Canonical vehicle listing produced by the normalizer
#[derive(Debug, Clone, Serialize)]
pub struct Listing {
    pub id: String,
    pub title: String,
    pub price: i64,
    pub year: i32,
    pub km: i64,
    #[serde(rename = "fuel")]
    pub fuel_type: String,
    pub url: String,
    pub city: String,
    #[serde(skip)]
    pub market: Market,
    /// Source record, kept for diagnostics only
    #[serde(skip)]
    pub raw_data: Option<RawRecord>,
}

impl Listing {
    pub fn is_valid(&self) -> bool {
        self.price > 0
    }
}

/// A cross-market pair judged equivalent, with the resulting savings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub market_a_listing: Listing,
    pub market_b_listing: Listing,
    pub savings_gross: i64,
    pub import_cost: i64,
    pub savings_net: i64,
    pub savings_percent: i64,
}

impl MatchResult {
    pub fn new(listing_a: Listing, listing_b: Listing, import_cost: i64) -> Self {
        let savings_gross = listing_b.price.saturating_sub(listing_a.price);
        let savings_percent = if listing_b.price > 0 {
            (savings_gross as f64 / listing_b.price as f64 * 100.0).round() as i64
        } else {
            0
        };

        Self {
            market_a_listing: listing_a,
            market_b_listing: listing_b,
            savings_gross,
            import_cost,
            savings_net: savings_gross.saturating_sub(import_cost),
            savings_percent,
        }
    }

    /// Market A price plus the flat import cost
    pub fn landed_cost(&self) -> i64 {
        self.market_a_listing.price.saturating_add(self.import_cost)
    }
}

/// Fuel filter applied when building search URLs
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FuelFilter {
    #[default]
    All,
    Diesel,
    Petrol,
    Hybrid,
    Electric,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Search locality for market B
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Locality {
    pub city: String,
    /// Search radius around the city, 0 means the city only
    pub radius_km: u32,
    /// Explicit coordinates; resolved from the city directory when absent
    pub coordinates: Option<Coordinates>,
}

/// What the user is looking for
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchCriteria {
    pub brand: String,
    pub model: String,
    pub year_min: Option<i32>,
    pub year_max: Option<i32>,
    pub km_max: Option<i64>,
    pub fuel: FuelFilter,
    pub price_max: Option<i64>,
    pub locality: Option<Locality>,
}

impl SearchCriteria {
    /// Free text query sent to both marketplaces
    pub fn query_text(&self) -> String {
        format!("{} {}", self.brand, self.model).trim().to_string()
    }
}

/// How a market pipeline ended
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    Succeeded,
    Failed,
    TimedOut,
    Unavailable,
}

/// Per-market summary, so an empty listing set can be told apart from a
/// pipeline failure.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketReport {
    pub status: PipelineStatus,
    pub raw_count: usize,
    pub kept_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchReports {
    pub market_a: MarketReport,
    pub market_b: MarketReport,
}

/// Result of one search request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub market_a: Vec<Listing>,
    pub market_b: Vec<Listing>,
    pub matches: Vec<MatchResult>,
    pub reports: SearchReports,
    pub searched_at: DateTime<Utc>,
}
