use thiserror::Error;

/// Errors talking to the scraping provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider answered with a non-success status
    #[error("provider returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid provider payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// A job reported success without a dataset to read from
    #[error("job {job_id} finished without a dataset")]
    MissingDataset { job_id: String },
}

impl ProviderError {
    /// Whether a failed submission is worth retrying
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Api { status, .. } => *status == 429 || *status >= 500,
            ProviderError::Http(err) => !err.is_builder() && !err.is_decode(),
            ProviderError::Decode(_) | ProviderError::MissingDataset { .. } => false,
        }
    }
}

/// Request-level search failure.
///
/// Partial failures degrade to empty markets; only losing the provider for
/// both markets surfaces here.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("provider unreachable for both markets (market A: {market_a}; market B: {market_b})")]
    ProviderUnreachable { market_a: String, market_b: String },
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("no provider token configured (set APIFY_API_TOKEN or provider.token)")]
    MissingToken,
}

pub type Result<T, E = ProviderError> = std::result::Result<T, E>;
