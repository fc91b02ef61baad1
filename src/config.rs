//! Configuration types for goes-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Task store location
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// SQLite file holding the task table (default: "goes-dl.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Transfer settings for the bounded fetcher
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Maximum simultaneous transfers across a batch (default: 10)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Deadline for a whole transfer, headers and body (default: 300 seconds)
    ///
    /// A transfer that exceeds it fails with a transfer error and frees its slot.
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Deadline for establishing a connection (default: 30 seconds)
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            request_timeout: default_request_timeout(),
            connect_timeout: default_connect_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Orchestrator batching
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Maximum tasks claimed per round (default: 34)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
        }
    }
}

/// Where dataset objects are served from
///
/// Object names resolve to `{base_url}/{bucket}/{name}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Public storage endpoint (default: "https://storage.googleapis.com")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bucket holding the datasets (default: "gcp-public-data-goes-16")
    #[serde(default = "default_bucket")]
    pub bucket: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            bucket: default_bucket(),
        }
    }
}

/// Top-level configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Task store location
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Transfer settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Orchestrator batching
    #[serde(default)]
    pub batch: BatchConfig,

    /// Dataset source
    #[serde(default)]
    pub source: SourceConfig,
}

impl Config {
    /// Parse a JSON configuration document and validate it
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would stall or misroute a run
    pub fn validate(&self) -> Result<()> {
        if self.fetch.max_concurrent == 0 {
            return Err(config_error(
                "max_concurrent must be at least 1",
                "fetch.max_concurrent",
            ));
        }
        if self.fetch.request_timeout.is_zero() {
            return Err(config_error(
                "request_timeout must be greater than zero",
                "fetch.request_timeout",
            ));
        }
        if self.fetch.connect_timeout.is_zero() {
            return Err(config_error(
                "connect_timeout must be greater than zero",
                "fetch.connect_timeout",
            ));
        }
        if self.batch.batch_size == 0 {
            return Err(config_error(
                "batch_size must be at least 1",
                "batch.batch_size",
            ));
        }
        if self.source.bucket.trim().is_empty() {
            return Err(config_error("bucket must not be empty", "source.bucket"));
        }
        if let Err(e) = url::Url::parse(&self.source.base_url) {
            return Err(config_error(
                &format!("invalid base_url '{}': {}", self.source.base_url, e),
                "source.base_url",
            ));
        }
        Ok(())
    }
}

fn config_error(message: &str, key: &str) -> Error {
    Error::Config {
        message: message.to_string(),
        key: Some(key.to_string()),
    }
}

fn default_database_path() -> PathBuf {
    PathBuf::from("goes-dl.db")
}

fn default_max_concurrent() -> usize {
    10
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    format!("goes-dl/{}", env!("CARGO_PKG_VERSION"))
}

fn default_batch_size() -> usize {
    34
}

fn default_base_url() -> String {
    "https://storage.googleapis.com".to_string()
}

fn default_bucket() -> String {
    "gcp-public-data-goes-16".to_string()
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
