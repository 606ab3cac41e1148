//! Cross-border used car arbitrage.
//!
//! Scrapes the same search on two marketplaces through an external scraping
//! provider, normalizes the heterogeneous results into [`models::Listing`]s and
//! pairs comparable vehicles to find ones that are cheaper to import than to
//! buy locally.

pub mod config;
pub mod error;
pub mod matcher;
pub mod models;
pub mod normalizer;
pub mod orchestrator;
pub mod provider;
pub mod search;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

pub use error::{ConfigError, ProviderError, SearchError};
pub use matcher::{MarketMatcher, MatchStrategy, YearMileageTolerance};
pub use models::{Listing, Market, MatchResult, SearchCriteria, SearchResult};
pub use normalizer::{IdGenerator, ListingNormalizer, RandomIds};
pub use orchestrator::{JobOutcome, PollPolicy, RetryPolicy, ScrapeJobOrchestrator};
pub use provider::{ApifyClient, ScrapeProvider};
pub use search::{SearchCoordinator, SearchSettings};
