//! Submission and polling of provider jobs.
//!
//! A job is submitted once per market and polled until it reaches a terminal
//! state or the local wait budget runs out. Everything short of a successful
//! run degrades to an empty record set; [`JobOutcome`] keeps the reason so
//! callers can tell "no results" apart from "pipeline failed".

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

use crate::error::{ProviderError, Result};
use crate::models::PipelineStatus;
use crate::provider::{JobId, JobRequest, JobStatus, RawRecord, ScrapeProvider};

/// How long to wait for a job and how often to check on it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_wait: Duration,
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_wait: Duration::from_secs(120),
            interval: Duration::from_secs(3),
        }
    }
}

/// Bounded retry with exponential backoff for job submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    /// Single attempt, no retry
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

/// How a job ended
#[derive(Debug)]
pub enum JobOutcome {
    /// The job succeeded; the dataset may still be empty
    Succeeded(Vec<RawRecord>),
    /// The provider reported a terminal failure
    Failed(JobStatus),
    /// The local wait budget ran out while the job was still running
    TimedOut { last_status: JobStatus },
    /// The job could not be submitted or the provider stopped answering
    Unavailable(ProviderError),
}

impl JobOutcome {
    /// Records of a successful run, empty for every other outcome
    pub fn into_records(self) -> Vec<RawRecord> {
        match self {
            JobOutcome::Succeeded(records) => records,
            _ => Vec::new(),
        }
    }

    pub fn pipeline_status(&self) -> PipelineStatus {
        match self {
            JobOutcome::Succeeded(_) => PipelineStatus::Succeeded,
            JobOutcome::Failed(_) => PipelineStatus::Failed,
            JobOutcome::TimedOut { .. } => PipelineStatus::TimedOut,
            JobOutcome::Unavailable(_) => PipelineStatus::Unavailable,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, JobOutcome::Unavailable(_))
    }

    /// Human readable reason for anything but success
    pub fn detail(&self) -> Option<String> {
        match self {
            JobOutcome::Succeeded(_) => None,
            JobOutcome::Failed(status) => Some(format!("job ended with {status}")),
            JobOutcome::TimedOut { last_status } => {
                Some(format!("gave up waiting, job still {last_status}"))
            }
            JobOutcome::Unavailable(err) => Some(err.to_string()),
        }
    }
}

/// Drives provider jobs from submission to a terminal state
pub struct ScrapeJobOrchestrator {
    provider: Arc<dyn ScrapeProvider>,
    retry: RetryPolicy,
}

impl ScrapeJobOrchestrator {
    pub fn new(provider: Arc<dyn ScrapeProvider>) -> Self {
        Self::with_retry(provider, RetryPolicy::default())
    }

    pub fn with_retry(provider: Arc<dyn ScrapeProvider>, retry: RetryPolicy) -> Self {
        Self { provider, retry }
    }

    /// Submit a job, retrying transient rejections with backoff
    pub async fn submit(&self, request: &JobRequest) -> Result<JobId> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut backoff = self.retry.initial_backoff;
        let mut attempt = 1;

        loop {
            match self.provider.start_job(request).await {
                Ok(job_id) => {
                    info!(
                        market = %request.market,
                        job_id = %job_id,
                        provider = self.provider.provider_name(),
                        "Job submitted"
                    );
                    return Ok(job_id);
                }
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    warn!(
                        market = %request.market,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "Job submission failed, retrying"
                    );
                    sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                    attempt += 1;
                }
                Err(err) => {
                    error!(market = %request.market, attempt, error = %err, "Job submission failed");
                    return Err(err);
                }
            }
        }
    }

    /// Poll a job every `interval` until it ends or `max_wait` has elapsed
    pub async fn poll(&self, job_id: &JobId, max_wait: Duration, interval: Duration) -> JobOutcome {
        let started = Instant::now();
        let mut last_status = JobStatus::Pending;

        while started.elapsed() < max_wait {
            let state = match self.provider.job_state(job_id).await {
                Ok(state) => state,
                Err(err) => {
                    warn!(job_id = %job_id, error = %err, "Status check failed");
                    return JobOutcome::Unavailable(err);
                }
            };
            last_status = state.status;
            debug!(job_id = %job_id.short(), status = %state.status, "Polled job");

            match state.status {
                JobStatus::Succeeded => {
                    let Some(dataset_id) = state.dataset_id else {
                        return JobOutcome::Unavailable(ProviderError::MissingDataset {
                            job_id: job_id.to_string(),
                        });
                    };
                    return self.fetch(job_id, &dataset_id).await;
                }
                status if status.is_terminal() => {
                    warn!(job_id = %job_id, status = %status, "Job ended without results");
                    return JobOutcome::Failed(status);
                }
                _ => {}
            }

            sleep(interval.min(max_wait.saturating_sub(started.elapsed()))).await;
        }

        warn!(
            job_id = %job_id,
            status = %last_status,
            waited_secs = started.elapsed().as_secs(),
            "Gave up waiting for job"
        );
        JobOutcome::TimedOut { last_status }
    }

    /// Submit then poll; submission errors become [`JobOutcome::Unavailable`]
    pub async fn run(&self, request: &JobRequest, policy: PollPolicy) -> JobOutcome {
        match self.submit(request).await {
            Ok(job_id) => self.poll(&job_id, policy.max_wait, policy.interval).await,
            Err(err) => JobOutcome::Unavailable(err),
        }
    }

    async fn fetch(&self, job_id: &JobId, dataset_id: &str) -> JobOutcome {
        match self.provider.dataset_items(dataset_id).await {
            Ok(records) => {
                info!(job_id = %job_id, dataset_id, count = records.len(), "Fetched job results");
                JobOutcome::Succeeded(records)
            }
            Err(err) => {
                warn!(job_id = %job_id, dataset_id, error = %err, "Failed to fetch job results");
                JobOutcome::Unavailable(err)
            }
        }
    }
}
