use crate::error::Result;
use crate::provider::types::{JobId, JobRequest, JobState, RawRecord};
use async_trait::async_trait;

/// Common trait for scraping providers
/// Keeps the orchestrator independent of the provider's REST dialect
#[async_trait]
pub trait ScrapeProvider: Send + Sync {
    /// Submit an extraction job, returning its id
    async fn start_job(&self, request: &JobRequest) -> Result<JobId>;

    /// Current status of a job
    async fn job_state(&self, job_id: &JobId) -> Result<JobState>;

    /// Items of a finished job's dataset
    async fn dataset_items(&self, dataset_id: &str) -> Result<Vec<RawRecord>>;

    /// Get the name of the provider
    fn provider_name(&self) -> &'static str;
}
