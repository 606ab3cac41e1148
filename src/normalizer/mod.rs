//! Maps raw provider records into canonical [`Listing`]s.

pub mod relevance;
pub mod schema;

pub use relevance::RelevanceFilter;
pub use schema::{FieldRule, ListingSchema};

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::Regex;
use std::sync::Arc;
use tracing::debug;

use crate::models::{Listing, Market};
use crate::provider::RawRecord;

/// Source of identifiers for records that carry none
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_LEN: usize = 9;

/// Random 9 character base-36 tokens
pub struct RandomIds {
    rng: Mutex<StdRng>,
}

impl RandomIds {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Reproducible sequence for tests
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for RandomIds {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for RandomIds {
    fn next_id(&self) -> String {
        let mut rng = self.rng.lock();
        (0..ID_LEN)
            .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
            .collect()
    }
}

/// Turns raw records into listings, one schema per market
pub struct ListingNormalizer {
    market_a: ListingSchema,
    market_b: ListingSchema,
    ids: Arc<dyn IdGenerator>,
    year_pattern: Regex,
}

impl ListingNormalizer {
    pub fn new(ids: Arc<dyn IdGenerator>) -> Self {
        Self::with_schemas(
            ListingSchema::for_market(Market::A),
            ListingSchema::for_market(Market::B),
            ids,
        )
    }

    pub fn with_schemas(market_a: ListingSchema, market_b: ListingSchema, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            market_a,
            market_b,
            ids,
            year_pattern: Regex::new(r"(?:19|20)\d{2}").expect("static pattern"),
        }
    }

    pub fn schema(&self, market: Market) -> &ListingSchema {
        match market {
            Market::A => &self.market_a,
            Market::B => &self.market_b,
        }
    }

    /// Normalize one record; `None` when it has no positive price
    pub fn normalize(&self, raw: RawRecord, market: Market) -> Option<Listing> {
        self.normalize_with_city(raw, market, None)
    }

    /// Normalize a batch, keeping the input order.
    ///
    /// `city_hint` replaces the schema's default city for records without one.
    pub fn normalize_all(&self, records: Vec<RawRecord>, market: Market, city_hint: Option<&str>) -> Vec<Listing> {
        let total = records.len();
        let listings: Vec<Listing> = records
            .into_iter()
            .filter_map(|raw| self.normalize_with_city(raw, market, city_hint))
            .collect();

        debug!(
            market = %market,
            kept = listings.len(),
            discarded = total - listings.len(),
            "Normalized records"
        );
        listings
    }

    fn normalize_with_city(&self, raw: RawRecord, market: Market, city_hint: Option<&str>) -> Option<Listing> {
        let schema = self.schema(market);

        let price = schema.price.integer(&raw).unwrap_or(0);
        if price <= 0 {
            return None;
        }

        let km = schema.km.integer(&raw).unwrap_or(0).max(0);
        let year = schema
            .year
            .scan(&raw, &self.year_pattern)
            .and_then(|year| year.parse().ok())
            .unwrap_or(0);

        let title = schema
            .title
            .text(&raw)
            .or_else(|| {
                let joined = schema
                    .title_parts
                    .iter()
                    .filter_map(|part| part.text(&raw))
                    .collect::<Vec<_>>()
                    .join(" ");
                (!joined.is_empty()).then_some(joined)
            })
            .unwrap_or_else(|| schema.default_title.clone());

        let city = schema
            .city
            .text(&raw)
            .or_else(|| city_hint.filter(|city| !city.is_empty()).map(str::to_string))
            .unwrap_or_else(|| schema.default_city.clone());

        Some(Listing {
            id: schema.id.text(&raw).unwrap_or_else(|| self.ids.next_id()),
            title,
            price,
            year,
            km,
            fuel_type: schema.fuel.text(&raw).unwrap_or_else(|| "N/A".to_string()),
            url: schema.url.text(&raw).unwrap_or_else(|| schema.default_url.clone()),
            city,
            market,
            raw_data: Some(raw),
        })
    }
}
