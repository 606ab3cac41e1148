use regex::Regex;
use serde_json::Value;

use crate::models::Market;
use crate::provider::RawRecord;

/// One place a canonical field may come from
#[derive(Debug, Clone)]
struct Candidate {
    key: String,
    /// Capture applied to the value; group 1 if present, else the whole match
    pattern: Option<Regex>,
}

/// Ordered fallback chain of source keys for one canonical field.
///
/// Keys may be dotted paths into nested objects. The first candidate that
/// yields a usable value wins.
#[derive(Debug, Clone, Default)]
pub struct FieldRule {
    candidates: Vec<Candidate>,
}

impl FieldRule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(keys: &[&str]) -> Self {
        keys.iter().fold(Self::new(), |rule, key| rule.key(key))
    }

    pub fn key(mut self, key: &str) -> Self {
        self.candidates.push(Candidate {
            key: key.to_string(),
            pattern: None,
        });
        self
    }

    /// Read `key` and keep only what `pattern` captures
    pub fn extract(mut self, key: &str, pattern: Regex) -> Self {
        self.candidates.push(Candidate {
            key: key.to_string(),
            pattern: Some(pattern),
        });
        self
    }

    /// First non-empty text value along the chain
    pub fn text(&self, raw: &RawRecord) -> Option<String> {
        self.candidates.iter().find_map(|candidate| {
            let text = value_text(raw.lookup(&candidate.key)?)?;
            match &candidate.pattern {
                Some(pattern) => capture(pattern, &text),
                None => Some(text),
            }
        })
    }

    /// First value along the chain that reads as an integer.
    ///
    /// JSON numbers are taken by value (floats truncate). Strings keep only
    /// their ASCII digits, so `"12.345 €"` reads as 12345.
    pub fn integer(&self, raw: &RawRecord) -> Option<i64> {
        self.candidates.iter().find_map(|candidate| {
            let value = scalar(raw.lookup(&candidate.key)?);
            match (value, &candidate.pattern) {
                (Value::Number(number), None) => number
                    .as_i64()
                    .or_else(|| number.as_f64().map(|float| float as i64)),
                _ => {
                    let text = value_text(value)?;
                    let text = match &candidate.pattern {
                        Some(pattern) => capture(pattern, &text)?,
                        None => text,
                    };
                    digits(&text)
                }
            }
        })
    }

    /// First match of `pattern` across the chain
    pub fn scan(&self, raw: &RawRecord, pattern: &Regex) -> Option<String> {
        self.candidates.iter().find_map(|candidate| {
            let text = value_text(raw.lookup(&candidate.key)?)?;
            pattern.find(&text).map(|found| found.as_str().to_string())
        })
    }
}

/// Keep ASCII digits only and parse what is left
pub fn digits(text: &str) -> Option<i64> {
    let cleaned: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    cleaned.parse().ok()
}

/// Single-element arrays stand for their only item
fn scalar(value: &Value) -> &Value {
    match value {
        Value::Array(items) if items.len() == 1 => &items[0],
        other => other,
    }
}

fn value_text(value: &Value) -> Option<String> {
    let text = match scalar(value) {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn capture(pattern: &Regex, text: &str) -> Option<String> {
    let captures = pattern.captures(text)?;
    let matched = captures.get(1).or_else(|| captures.get(0))?;
    let matched = matched.as_str().trim();
    (!matched.is_empty()).then(|| matched.to_string())
}

fn pattern(source: &str) -> Regex {
    Regex::new(source).expect("static pattern")
}

/// Where each canonical listing field comes from for one market
#[derive(Debug, Clone)]
pub struct ListingSchema {
    pub id: FieldRule,
    pub title: FieldRule,
    /// Joined with spaces when no title is found
    pub title_parts: Vec<FieldRule>,
    pub price: FieldRule,
    pub km: FieldRule,
    pub year: FieldRule,
    pub fuel: FieldRule,
    pub url: FieldRule,
    pub city: FieldRule,
    pub default_title: String,
    pub default_url: String,
    pub default_city: String,
}

impl ListingSchema {
    pub fn for_market(market: Market) -> Self {
        match market {
            Market::A => Self::mobile_de(),
            Market::B => Self::leboncoin(),
        }
    }

    /// mobile.de items from the `3x1t~mobile-de-scraper` actor
    pub fn mobile_de() -> Self {
        Self {
            id: FieldRule::new().extract("url", pattern(r"id=(\d+)")).key("id"),
            title: FieldRule::keys(&["title"]),
            title_parts: vec![FieldRule::keys(&["brand"]), FieldRule::keys(&["model"])],
            price: FieldRule::keys(&["price.total.amount", "price.amount", "price"]),
            km: FieldRule::keys(&["attributes.Mileage", "mileage"]),
            year: FieldRule::keys(&["attributes.First Registration", "firstRegistration", "year"]),
            fuel: FieldRule::keys(&["attributes.Fuel", "fuel"]),
            url: FieldRule::keys(&["url"]),
            city: FieldRule::new().extract("dealerDetails.address", pattern(r"DE-\d+\s+(.+)$")),
            default_title: "Vehicle".into(),
            default_url: "https://www.mobile.de".into(),
            default_city: "Germany".into(),
        }
    }

    /// leboncoin items from the `scrapifier~leboncoin-universal-scraper` actor
    pub fn leboncoin() -> Self {
        Self {
            id: FieldRule::keys(&["id"]),
            title: FieldRule::keys(&["title", "name"]),
            title_parts: Vec::new(),
            price: FieldRule::keys(&["price"]),
            km: FieldRule::keys(&["mileage", "km", "attributes.mileage", "attributes.km"]),
            year: FieldRule::keys(&["year", "regdate", "attributes.regdate", "attributes.year"]),
            fuel: FieldRule::keys(&["fuel", "attributes.fuel"]),
            url: FieldRule::keys(&["url", "link"]),
            city: FieldRule::keys(&["location", "city", "attributes.location", "attributes.city"]),
            default_title: "Vehicle".into(),
            default_url: "https://www.leboncoin.fr".into(),
            default_city: "France".into(),
        }
    }
}
