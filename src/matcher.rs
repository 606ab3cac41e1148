//! Cross-market pairing and savings.
//!
//! Pairing is greedy: each market A listing takes the *first* market B listing
//! the strategy accepts, in input order. There is no nearest-neighbour search
//! and no exclusivity, so one B listing can back several matches.

use tracing::debug;

use crate::models::{Listing, MatchResult};

pub const DEFAULT_IMPORT_COST: i64 = 650;
pub const DEFAULT_THRESHOLD: i64 = 300;

/// Decides whether two listings describe comparable vehicles
pub trait MatchStrategy: Send + Sync {
    fn is_equivalent(&self, listing_a: &Listing, listing_b: &Listing) -> bool;
}

/// Registration year and mileage within fixed tolerances
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearMileageTolerance {
    pub years: i32,
    pub km: i64,
}

impl Default for YearMileageTolerance {
    fn default() -> Self {
        Self {
            years: 1,
            km: 20_000,
        }
    }
}

impl MatchStrategy for YearMileageTolerance {
    fn is_equivalent(&self, listing_a: &Listing, listing_b: &Listing) -> bool {
        (listing_b.year - listing_a.year).abs() <= self.years
            && (listing_b.km - listing_a.km).abs() <= self.km
    }
}

pub struct MarketMatcher {
    strategy: Box<dyn MatchStrategy>,
}

impl Default for MarketMatcher {
    fn default() -> Self {
        Self::new(YearMileageTolerance::default())
    }
}

impl MarketMatcher {
    pub fn new(strategy: impl MatchStrategy + 'static) -> Self {
        Self {
            strategy: Box::new(strategy),
        }
    }

    /// Pair listings and keep those saving more than `threshold` after
    /// `import_cost`, best savings first.
    pub fn match_listings(
        &self,
        listings_a: &[Listing],
        listings_b: &[Listing],
        import_cost: i64,
        threshold: i64,
    ) -> Vec<MatchResult> {
        let mut matches: Vec<MatchResult> = listings_a
            .iter()
            .filter_map(|listing_a| {
                let listing_b = listings_b
                    .iter()
                    .find(|listing_b| self.strategy.is_equivalent(listing_a, listing_b))?;

                if listing_a.price >= listing_b.price {
                    return None;
                }

                let result = MatchResult::new(listing_a.clone(), listing_b.clone(), import_cost);
                (result.savings_net > threshold).then_some(result)
            })
            .collect();

        // Stable, so equal savings keep market A order
        matches.sort_by(|left, right| right.savings_net.cmp(&left.savings_net));

        debug!(
            market_a = listings_a.len(),
            market_b = listings_b.len(),
            matches = matches.len(),
            "Matched listings"
        );
        matches
    }
}
