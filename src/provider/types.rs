use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::models::Market;

/// One scraped item, as returned by the provider.
///
/// The shape varies per actor and sometimes per item, so it is kept as an
/// untyped JSON object and probed through [`RawRecord::lookup`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(Map<String, Value>);

impl RawRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Wrap a JSON value, returning `None` for anything that is not an object
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self(fields)),
            _ => None,
        }
    }

    /// Resolve a field by key.
    ///
    /// The key is first tried literally (some actors emit flattened keys such as
    /// `price.total.amount`), then as a dotted path into nested objects.
    pub fn lookup(&self, key: &str) -> Option<&Value> {
        if let Some(value) = self.0.get(key) {
            return Some(value);
        }

        let mut segments = key.split('.');
        let mut current = self.0.get(segments.next()?)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for RawRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// Provider-side identifier of a submitted job
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shortened form for log lines
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(8) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An extraction job to submit for one market
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    pub target_url: String,
    pub item_cap: u32,
    pub market: Market,
}

/// Lifecycle of a provider job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Aborted,
    TimedOut,
}

impl JobStatus {
    /// Map an Apify run status string.
    ///
    /// Transitional states (`ABORTING`, `TIMING-OUT`) still count as running;
    /// unknown strings are treated as pending so polling continues.
    pub fn from_provider(status: &str) -> Self {
        match status {
            "READY" => JobStatus::Pending,
            "RUNNING" | "ABORTING" | "TIMING-OUT" => JobStatus::Running,
            "SUCCEEDED" => JobStatus::Succeeded,
            "FAILED" => JobStatus::Failed,
            "ABORTED" => JobStatus::Aborted,
            "TIMED-OUT" | "TIMED_OUT" => JobStatus::TimedOut,
            _ => JobStatus::Pending,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Pending | JobStatus::Running)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Succeeded => "SUCCEEDED",
            JobStatus::Failed => "FAILED",
            JobStatus::Aborted => "ABORTED",
            JobStatus::TimedOut => "TIMED_OUT",
        };
        f.write_str(name)
    }
}

/// Status snapshot of a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobState {
    pub status: JobStatus,
    pub dataset_id: Option<String>,
}

/// Input accepted by the Apify scraper actors.
#[derive(Debug, Clone, Serialize)]
pub struct ActorInput {
    #[serde(rename = "startUrls")]
    pub start_urls: Vec<StartUrl>,
    #[serde(rename = "maxItems")]
    pub max_items: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct StartUrl {
    pub url: String,
}

/// Wrapper for Apify API responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

/// Apify actor run metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct RunData {
    pub id: String,
    pub status: String,
    #[serde(rename = "defaultDatasetId")]
    pub default_dataset_id: Option<String>,
    #[serde(rename = "startedAt")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(rename = "finishedAt")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunData {
    pub fn state(&self) -> JobState {
        JobState {
            status: JobStatus::from_provider(&self.status),
            dataset_id: self.default_dataset_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> RawRecord {
        RawRecord::from_value(value).unwrap()
    }

    #[test]
    fn lookup_prefers_literal_dotted_key() {
        let raw = record(json!({
            "price.total.amount": 3200,
            "price": { "total": { "amount": 9999 } }
        }));
        assert_eq!(raw.lookup("price.total.amount"), Some(&json!(3200)));
    }

    #[test]
    fn lookup_walks_nested_objects() {
        let raw = record(json!({ "attributes": { "First Registration": "03/2019" } }));
        assert_eq!(
            raw.lookup("attributes.First Registration"),
            Some(&json!("03/2019"))
        );
        assert_eq!(raw.lookup("attributes.Mileage"), None);
        assert_eq!(raw.lookup("attributes.First Registration.x"), None);
    }

    #[test]
    fn non_objects_are_not_records() {
        assert!(RawRecord::from_value(json!([1, 2])).is_none());
        assert!(RawRecord::from_value(json!("text")).is_none());
    }

    #[test]
    fn maps_provider_statuses() {
        assert_eq!(JobStatus::from_provider("READY"), JobStatus::Pending);
        assert_eq!(JobStatus::from_provider("TIMING-OUT"), JobStatus::Running);
        assert_eq!(JobStatus::from_provider("TIMED-OUT"), JobStatus::TimedOut);
        assert_eq!(JobStatus::from_provider("SOMETHING"), JobStatus::Pending);
        assert!(JobStatus::Aborted.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
    }

    #[test]
    fn run_data_parses_apify_envelope() {
        let body = json!({
            "data": {
                "id": "HG7ML7M8z78YcAPEB",
                "status": "SUCCEEDED",
                "defaultDatasetId": "wmKPijuyDnPZAPRMk",
                "startedAt": "2024-01-01T10:00:00.000Z",
                "finishedAt": null
            }
        });
        let resp: ApiResponse<RunData> = serde_json::from_value(body).unwrap();
        let state = resp.data.state();
        assert_eq!(state.status, JobStatus::Succeeded);
        assert_eq!(state.dataset_id.as_deref(), Some("wmKPijuyDnPZAPRMk"));
    }

    #[test]
    fn job_id_short_form() {
        assert_eq!(JobId::new("HG7ML7M8z78YcAPEB").short(), "HG7ML7M8");
        assert_eq!(JobId::new("abc").short(), "abc");
    }
}
