//! In-memory provider for tests.
//!
//! Scripts how each market's job behaves (submission failures, the status
//! sequence reported while polling, the final dataset) without any network.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};

use crate::error::{ProviderError, Result};
use crate::models::Market;
use crate::provider::{JobId, JobRequest, JobState, JobStatus, RawRecord, ScrapeProvider};

/// Behaviour of one market's job
#[derive(Debug, Clone)]
pub struct MarketScript {
    /// HTTP statuses returned by the first submissions, in order
    submit_failures: VecDeque<u16>,
    /// Statuses reported by successive polls; the last one repeats
    statuses: VecDeque<JobStatus>,
    items: Vec<RawRecord>,
    /// Status checks answer with this HTTP status instead of a state
    status_failure: Option<u16>,
}

impl MarketScript {
    /// Job that succeeds on the first poll with the given items
    pub fn succeeding(items: Vec<Value>) -> Self {
        Self {
            submit_failures: VecDeque::new(),
            statuses: VecDeque::from([JobStatus::Succeeded]),
            items: items.into_iter().filter_map(RawRecord::from_value).collect(),
            status_failure: None,
        }
    }

    /// Job that reports `status` on every poll
    pub fn ending_with(status: JobStatus) -> Self {
        Self {
            statuses: VecDeque::from([status]),
            ..Self::succeeding(Vec::new())
        }
    }

    /// Job whose every submission is rejected with `status`
    pub fn rejecting(status: u16) -> Self {
        Self {
            submit_failures: std::iter::repeat(status).take(64).collect(),
            ..Self::succeeding(Vec::new())
        }
    }

    /// Reject the first `count` submissions with `status`
    pub fn with_failed_submissions(mut self, count: usize, status: u16) -> Self {
        self.submit_failures = std::iter::repeat(status).take(count).collect();
        self
    }

    /// Report these statuses on successive polls before the final one
    pub fn with_statuses(mut self, statuses: Vec<JobStatus>) -> Self {
        let last = self.statuses.back().copied();
        self.statuses = statuses.into_iter().chain(last).collect();
        self
    }

    /// Answer status checks with an HTTP error
    pub fn with_status_failure(mut self, status: u16) -> Self {
        self.status_failure = Some(status);
        self
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct CallCounts {
    submissions: usize,
    status_checks: usize,
    dataset_fetches: usize,
}

/// Provider whose jobs follow per-market scripts
#[derive(Default)]
pub struct ScriptedProvider {
    scripts: Mutex<HashMap<Market, MarketScript>>,
    requests: Mutex<Vec<JobRequest>>,
    calls: Mutex<HashMap<Market, CallCounts>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn market(self, market: Market, script: MarketScript) -> Self {
        self.scripts.lock().insert(market, script);
        self
    }

    /// Requests received by `start_job`, including rejected ones
    pub fn requests(&self) -> Vec<JobRequest> {
        self.requests.lock().clone()
    }

    pub fn submissions(&self, market: Market) -> usize {
        self.counts(market).submissions
    }

    pub fn status_checks(&self, market: Market) -> usize {
        self.counts(market).status_checks
    }

    pub fn dataset_fetches(&self, market: Market) -> usize {
        self.counts(market).dataset_fetches
    }

    fn counts(&self, market: Market) -> CallCounts {
        self.calls.lock().get(&market).copied().unwrap_or_default()
    }

    fn job_id(market: Market) -> JobId {
        JobId::new(format!("job-{}", Self::suffix(market)))
    }

    fn dataset_id(market: Market) -> String {
        format!("dataset-{}", Self::suffix(market))
    }

    fn suffix(market: Market) -> &'static str {
        match market {
            Market::A => "a",
            Market::B => "b",
        }
    }

    fn market_of(id: &str) -> Option<Market> {
        if id.ends_with("-a") {
            Some(Market::A)
        } else if id.ends_with("-b") {
            Some(Market::B)
        } else {
            None
        }
    }

    fn not_found(id: &str) -> ProviderError {
        ProviderError::Api {
            status: 404,
            message: format!("unknown id {id}"),
        }
    }
}

#[async_trait]
impl ScrapeProvider for ScriptedProvider {
    async fn start_job(&self, request: &JobRequest) -> Result<JobId> {
        self.requests.lock().push(request.clone());
        self.calls.lock().entry(request.market).or_default().submissions += 1;

        let mut scripts = self.scripts.lock();
        let script = scripts
            .get_mut(&request.market)
            .ok_or_else(|| Self::not_found(request.market.label()))?;

        match script.submit_failures.pop_front() {
            Some(status) => Err(ProviderError::Api {
                status,
                message: "scripted rejection".into(),
            }),
            None => Ok(Self::job_id(request.market)),
        }
    }

    async fn job_state(&self, job_id: &JobId) -> Result<JobState> {
        let market = Self::market_of(job_id.as_str()).ok_or_else(|| Self::not_found(job_id.as_str()))?;
        self.calls.lock().entry(market).or_default().status_checks += 1;

        let mut scripts = self.scripts.lock();
        let script = scripts
            .get_mut(&market)
            .ok_or_else(|| Self::not_found(job_id.as_str()))?;

        if let Some(status) = script.status_failure {
            return Err(ProviderError::Api {
                status,
                message: "scripted status failure".into(),
            });
        }

        let next = if script.statuses.len() > 1 {
            script.statuses.pop_front()
        } else {
            script.statuses.front().copied()
        };
        let status = next.unwrap_or(JobStatus::Running);

        Ok(JobState {
            status,
            dataset_id: Some(Self::dataset_id(market)),
        })
    }

    async fn dataset_items(&self, dataset_id: &str) -> Result<Vec<RawRecord>> {
        let market = Self::market_of(dataset_id).ok_or_else(|| Self::not_found(dataset_id))?;
        self.calls.lock().entry(market).or_default().dataset_fetches += 1;

        let scripts = self.scripts.lock();
        let script = scripts.get(&market).ok_or_else(|| Self::not_found(dataset_id))?;
        Ok(script.items.clone())
    }

    fn provider_name(&self) -> &'static str {
        "Scripted"
    }
}
