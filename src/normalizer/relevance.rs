use crate::models::{Listing, Market, SearchCriteria};

/// Drops listings that do not mention the searched vehicle.
///
/// Marketplace text search is loose, so results for other models slip in.
/// Market A must mention both brand and model (in the title or the record's
/// own brand/model fields); market B only needs one of them in the title.
#[derive(Debug, Clone)]
pub struct RelevanceFilter {
    brand: String,
    model: String,
}

impl RelevanceFilter {
    pub fn new(brand: &str, model: &str) -> Self {
        Self {
            brand: brand.trim().to_lowercase(),
            model: model.trim().to_lowercase(),
        }
    }

    pub fn from_criteria(criteria: &SearchCriteria) -> Self {
        Self::new(&criteria.brand, &criteria.model)
    }

    pub fn is_relevant(&self, listing: &Listing) -> bool {
        let title = listing.title.to_lowercase();

        match listing.market {
            Market::A => {
                let has_brand = title.contains(&self.brand) || self.raw_contains(listing, "brand", &self.brand);
                let has_model = title.contains(&self.model) || self.raw_contains(listing, "model", &self.model);
                has_brand && has_model
            }
            Market::B => title.contains(&self.brand) || title.contains(&self.model),
        }
    }

    /// Keep relevant listings in their original order
    pub fn retain(&self, listings: Vec<Listing>) -> Vec<Listing> {
        listings.into_iter().filter(|listing| self.is_relevant(listing)).collect()
    }

    fn raw_contains(&self, listing: &Listing, key: &str, term: &str) -> bool {
        listing
            .raw_data
            .as_ref()
            .and_then(|raw| raw.lookup(key))
            .and_then(|value| value.as_str())
            .map(|value| value.to_lowercase().contains(term))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::RawRecord;
    use serde_json::json;

    fn listing(market: Market, title: &str) -> Listing {
        Listing {
            id: title.to_string(),
            title: title.to_string(),
            price: 1000,
            year: 2019,
            km: 50_000,
            fuel_type: "N/A".into(),
            url: String::new(),
            city: String::new(),
            market,
            raw_data: None,
        }
    }

    #[test]
    fn market_a_needs_brand_and_model() {
        let filter = RelevanceFilter::new("Renault", "Kangoo");

        assert!(filter.is_relevant(&listing(Market::A, "RENAULT Kangoo Maxi")));
        assert!(!filter.is_relevant(&listing(Market::A, "Renault Clio")));
    }

    #[test]
    fn market_a_reads_raw_brand_field() {
        let filter = RelevanceFilter::new("Renault", "Kangoo");
        let mut with_raw = listing(Market::A, "Kangoo 1.5 dCi");
        with_raw.raw_data = RawRecord::from_value(json!({ "brand": "Renault" }));

        assert!(filter.is_relevant(&with_raw));
    }

    #[test]
    fn market_b_needs_either_term() {
        let filter = RelevanceFilter::new("Renault", "Kangoo");

        assert!(filter.is_relevant(&listing(Market::B, "Kangoo utilitaire")));
        assert!(filter.is_relevant(&listing(Market::B, "Renault Clio")));
        assert!(!filter.is_relevant(&listing(Market::B, "Peugeot Partner")));
    }

    #[test]
    fn retain_keeps_order() {
        let filter = RelevanceFilter::new("Renault", "Kangoo");
        let kept = filter.retain(vec![
            listing(Market::B, "Renault 1"),
            listing(Market::B, "Peugeot"),
            listing(Market::B, "Kangoo 2"),
        ]);

        let titles: Vec<&str> = kept.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, vec!["Renault 1", "Kangoo 2"]);
    }
}
