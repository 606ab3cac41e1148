//! One search request: both market pipelines concurrently, then matching.

pub mod urls;

pub use urls::{City, CityDirectory, LeboncoinUrlBuilder, MobileDeUrlBuilder, SearchUrlBuilder};

use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::SearchError;
use crate::matcher::{MarketMatcher, DEFAULT_IMPORT_COST, DEFAULT_THRESHOLD};
use crate::models::{Listing, Market, MarketReport, SearchCriteria, SearchReports, SearchResult};
use crate::normalizer::{IdGenerator, ListingNormalizer, RandomIds, RelevanceFilter};
use crate::orchestrator::{PollPolicy, RetryPolicy, ScrapeJobOrchestrator};
use crate::provider::{JobRequest, ScrapeProvider};

/// Knobs for one search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchSettings {
    pub item_cap: u32,
    pub poll: PollPolicy,
    pub retry: RetryPolicy,
    pub import_cost: i64,
    pub threshold: i64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            item_cap: 20,
            poll: PollPolicy::default(),
            retry: RetryPolicy::default(),
            import_cost: DEFAULT_IMPORT_COST,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// What one market pipeline produced
struct MarketRun {
    listings: Vec<Listing>,
    report: MarketReport,
    unavailable: bool,
}

/// Runs both market pipelines and pairs their listings
pub struct SearchCoordinator {
    orchestrator: ScrapeJobOrchestrator,
    normalizer: ListingNormalizer,
    matcher: MarketMatcher,
    market_a_urls: Box<dyn SearchUrlBuilder>,
    market_b_urls: Box<dyn SearchUrlBuilder>,
    settings: SearchSettings,
}

impl SearchCoordinator {
    /// Coordinator with the stock mobile.de / leboncoin setup
    pub fn new(provider: Arc<dyn ScrapeProvider>, settings: SearchSettings) -> Self {
        Self {
            orchestrator: ScrapeJobOrchestrator::with_retry(provider, settings.retry),
            normalizer: ListingNormalizer::new(Arc::new(RandomIds::new())),
            matcher: MarketMatcher::default(),
            market_a_urls: Box::new(MobileDeUrlBuilder),
            market_b_urls: Box::new(LeboncoinUrlBuilder::default()),
            settings,
        }
    }

    pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.normalizer = ListingNormalizer::new(ids);
        self
    }

    pub fn with_normalizer(mut self, normalizer: ListingNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_matcher(mut self, matcher: MarketMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_url_builders(
        mut self,
        market_a: Box<dyn SearchUrlBuilder>,
        market_b: Box<dyn SearchUrlBuilder>,
    ) -> Self {
        self.market_a_urls = market_a;
        self.market_b_urls = market_b;
        self
    }

    /// Search both markets and return their listings with profitable matches.
    ///
    /// A market whose pipeline fails contributes no listings. Only when the
    /// provider could not be used for either market does this return an error.
    pub async fn search(&self, criteria: &SearchCriteria) -> Result<SearchResult, SearchError> {
        info!(query = %criteria.query_text(), "Starting cross-market search");

        let (market_a, market_b) = tokio::join!(
            self.run_market(Market::A, criteria),
            self.run_market(Market::B, criteria)
        );

        if market_a.unavailable && market_b.unavailable {
            error!("Provider unavailable for both markets");
            return Err(SearchError::ProviderUnreachable {
                market_a: market_a.report.detail.unwrap_or_default(),
                market_b: market_b.report.detail.unwrap_or_default(),
            });
        }

        let matches = self.matcher.match_listings(
            &market_a.listings,
            &market_b.listings,
            self.settings.import_cost,
            self.settings.threshold,
        );

        info!(
            market_a = market_a.listings.len(),
            market_b = market_b.listings.len(),
            matches = matches.len(),
            "Search complete"
        );

        Ok(SearchResult {
            market_a: market_a.listings,
            market_b: market_b.listings,
            matches,
            reports: SearchReports {
                market_a: market_a.report,
                market_b: market_b.report,
            },
            searched_at: Utc::now(),
        })
    }

    fn url_builder(&self, market: Market) -> &dyn SearchUrlBuilder {
        match market {
            Market::A => self.market_a_urls.as_ref(),
            Market::B => self.market_b_urls.as_ref(),
        }
    }

    async fn run_market(&self, market: Market, criteria: &SearchCriteria) -> MarketRun {
        let request = JobRequest {
            target_url: self.url_builder(market).search_url(criteria),
            item_cap: self.settings.item_cap,
            market,
        };
        info!(market = %market, url = %request.target_url, "Searching market");

        let outcome = self.orchestrator.run(&request, self.settings.poll).await;
        let status = outcome.pipeline_status();
        let detail = outcome.detail();
        let unavailable = outcome.is_unavailable();

        if let Some(reason) = &detail {
            warn!(market = %market, status = ?status, reason = %reason, "Market degraded to no results");
        }

        let records = outcome.into_records();
        let raw_count = records.len();

        // Listings without a city fall back to the searched city on market B
        let city_hint = match market {
            Market::A => None,
            Market::B => criteria.locality.as_ref().map(|l| l.city.as_str()),
        };
        let listings = self.normalizer.normalize_all(records, market, city_hint);
        let listings = RelevanceFilter::from_criteria(criteria).retain(listings);

        info!(market = %market, raw = raw_count, kept = listings.len(), "Market pipeline finished");

        MarketRun {
            report: MarketReport {
                status,
                raw_count,
                kept_count: listings.len(),
                detail,
            },
            listings,
            unavailable,
        }
    }
}
