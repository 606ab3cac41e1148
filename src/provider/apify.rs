use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{ProviderError, Result};
use crate::models::Market;
use crate::provider::traits::ScrapeProvider;
use crate::provider::types::{
    ActorInput, ApiResponse, JobId, JobRequest, JobState, RawRecord, RunData, StartUrl,
};

pub const DEFAULT_BASE_URL: &str = "https://api.apify.com/v2";

/// Actor used to scrape mobile.de
pub const MOBILE_DE_ACTOR: &str = "3x1t~mobile-de-scraper";

/// Actor used to scrape leboncoin
pub const LEBONCOIN_ACTOR: &str = "scrapifier~leboncoin-universal-scraper";

/// Actor id to run for each market
#[derive(Debug, Clone)]
pub struct MarketActors {
    pub market_a: String,
    pub market_b: String,
}

impl MarketActors {
    pub fn for_market(&self, market: Market) -> &str {
        match market {
            Market::A => &self.market_a,
            Market::B => &self.market_b,
        }
    }
}

impl Default for MarketActors {
    fn default() -> Self {
        Self {
            market_a: MOBILE_DE_ACTOR.to_string(),
            market_b: LEBONCOIN_ACTOR.to_string(),
        }
    }
}

/// Apify REST client
pub struct ApifyClient {
    client: Client,
    base_url: String,
    token: String,
    actors: MarketActors,
}

impl ApifyClient {
    /// Create a client against the public Apify API
    pub fn new(token: String, actors: MarketActors) -> Result<Self> {
        Self::with_options(token, actors, DEFAULT_BASE_URL, Duration::from_secs(30))
    }

    /// Create a client with a custom base URL and per-request timeout
    pub fn with_options(
        token: String,
        actors: MarketActors,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            actors,
        })
    }

    fn runs_url(&self, actor: &str) -> String {
        format!("{}/acts/{}/runs", self.base_url, actor)
    }

    fn run_url(&self, run_id: &JobId) -> String {
        format!("{}/actor-runs/{}", self.base_url, run_id)
    }

    fn items_url(&self, dataset_id: &str) -> String {
        format!(
            "{}/datasets/{}/items?format=json&clean=true",
            self.base_url, dataset_id
        )
    }

    /// Turn a non-success response into an API error carrying the body
    async fn check(resp: Response) -> Result<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        Err(ProviderError::Api {
            status: status.as_u16(),
            message: body,
        })
    }

    /// Read a successful response body as JSON
    async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T> {
        let body = Self::check(resp).await?.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl ScrapeProvider for ApifyClient {
    async fn start_job(&self, request: &JobRequest) -> Result<JobId> {
        let actor = self.actors.for_market(request.market);
        let input = ActorInput {
            start_urls: vec![StartUrl {
                url: request.target_url.clone(),
            }],
            max_items: request.item_cap,
        };

        debug!(market = %request.market, actor, url = %request.target_url, "Starting actor run");

        let resp = self
            .client
            .post(self.runs_url(actor))
            .bearer_auth(&self.token)
            .json(&input)
            .send()
            .await?;
        let api_resp: ApiResponse<RunData> = Self::decode(resp).await?;
        Ok(JobId::new(api_resp.data.id))
    }

    async fn job_state(&self, job_id: &JobId) -> Result<JobState> {
        let resp = self
            .client
            .get(self.run_url(job_id))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let api_resp: ApiResponse<RunData> = Self::decode(resp).await?;
        if let (Some(started), Some(finished)) = (api_resp.data.started_at, api_resp.data.finished_at) {
            debug!(
                run_id = %job_id,
                runtime_secs = (finished - started).num_seconds(),
                "Run finished"
            );
        }
        Ok(api_resp.data.state())
    }

    async fn dataset_items(&self, dataset_id: &str) -> Result<Vec<RawRecord>> {
        let resp = self
            .client
            .get(self.items_url(dataset_id))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let items: Vec<Value> = Self::decode(resp).await?;
        let total = items.len();
        let records: Vec<RawRecord> = items.into_iter().filter_map(RawRecord::from_value).collect();

        if records.len() < total {
            warn!(
                dataset_id,
                skipped = total - records.len(),
                "Skipped non-object dataset items"
            );
        }

        Ok(records)
    }

    fn provider_name(&self) -> &'static str {
        "Apify"
    }
}
