//! Settings file, environment overrides and logging setup.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::ConfigError;
use crate::matcher::{MarketMatcher, YearMileageTolerance, DEFAULT_IMPORT_COST, DEFAULT_THRESHOLD};
use crate::orchestrator::{PollPolicy, RetryPolicy};
use crate::provider::apify::{DEFAULT_BASE_URL, LEBONCOIN_ACTOR, MOBILE_DE_ACTOR};
use crate::provider::{ApifyClient, MarketActors};
use crate::search::SearchSettings;

/// Environment variable holding the provider token
pub const TOKEN_ENV: &str = "APIFY_API_TOKEN";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub actor_market_a: String,
    pub actor_market_b: String,
    pub item_cap: u32,
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            token: None,
            actor_market_a: MOBILE_DE_ACTOR.into(),
            actor_market_b: LEBONCOIN_ACTOR.into(),
            item_cap: 20,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub max_wait_secs: u64,
    pub interval_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            max_wait_secs: 120,
            interval_secs: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub import_cost: i64,
    pub threshold: i64,
    pub year_tolerance: i32,
    pub km_tolerance: i64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            import_cost: DEFAULT_IMPORT_COST,
            threshold: DEFAULT_THRESHOLD,
            year_tolerance: 1,
            km_tolerance: 20_000,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl LoggingConfig {
    /// Initialize the tracing subscriber; `RUST_LOG` takes precedence.
    pub fn init(&self) {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        match self.format.as_str() {
            "json" => {
                fmt().json().with_env_filter(filter).init();
            }
            _ => {
                fmt().with_env_filter(filter).with_target(false).init();
            }
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

/// All settings, as read from `config.toml`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub provider: ProviderConfig,
    pub polling: PollingConfig,
    pub retry: RetryConfig,
    pub matching: MatchingConfig,
    pub logging: LoggingConfig,
}

impl Settings {
    /// Load settings from `path` (defaults when the file does not exist),
    /// then apply `.env` and environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut settings = if path.exists() {
            let contents = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
            Self::parse(&contents)?
        } else {
            Self::default()
        };

        dotenvy::dotenv().ok();
        if let Ok(token) = std::env::var(TOKEN_ENV) {
            settings.apply_token(token);
        }

        settings.validate()?;
        Ok(settings)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Override the provider token; blank values are ignored
    pub fn apply_token(&mut self, token: String) {
        if !token.trim().is_empty() {
            self.provider.token = Some(token.trim().to_string());
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.item_cap == 0 {
            return Err(ConfigError::InvalidValue {
                field: "provider.item_cap",
                reason: "must be at least 1".into(),
            });
        }
        if self.polling.interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "polling.interval_secs",
                reason: "must be at least 1".into(),
            });
        }
        if self.polling.interval_secs > self.polling.max_wait_secs {
            return Err(ConfigError::InvalidValue {
                field: "polling.interval_secs",
                reason: format!(
                    "{}s exceeds polling.max_wait_secs ({}s)",
                    self.polling.interval_secs, self.polling.max_wait_secs
                ),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retry.max_attempts",
                reason: "must be at least 1".into(),
            });
        }
        if self.matching.year_tolerance < 0 || self.matching.km_tolerance < 0 {
            return Err(ConfigError::InvalidValue {
                field: "matching",
                reason: "tolerances cannot be negative".into(),
            });
        }
        Ok(())
    }

    pub fn search_settings(&self) -> SearchSettings {
        SearchSettings {
            item_cap: self.provider.item_cap,
            poll: PollPolicy {
                max_wait: Duration::from_secs(self.polling.max_wait_secs),
                interval: Duration::from_secs(self.polling.interval_secs),
            },
            retry: RetryPolicy {
                max_attempts: self.retry.max_attempts,
                initial_backoff: Duration::from_millis(self.retry.initial_backoff_ms),
            },
            import_cost: self.matching.import_cost,
            threshold: self.matching.threshold,
        }
    }

    pub fn matcher(&self) -> MarketMatcher {
        MarketMatcher::new(YearMileageTolerance {
            years: self.matching.year_tolerance,
            km: self.matching.km_tolerance,
        })
    }

    /// Build the live Apify client; requires a token
    pub fn apify_client(&self) -> Result<ApifyClient, ConfigError> {
        let token = self.provider.token.clone().ok_or(ConfigError::MissingToken)?;
        let actors = MarketActors {
            market_a: self.provider.actor_market_a.clone(),
            market_b: self.provider.actor_market_b.clone(),
        };

        ApifyClient::with_options(
            token,
            actors,
            &self.provider.base_url,
            Duration::from_secs(self.provider.request_timeout_secs),
        )
        .map_err(|err| ConfigError::InvalidValue {
            field: "provider",
            reason: err.to_string(),
        })
    }
}
