//! Configuration for pipeline runs
//!
//! Controls concurrency, per-job time budget, retries, caching, enrichment
//! and progress reporting.

use docket_domain::DetailLevel;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound on retries for a single record
const MAX_RETRIES_LIMIT: u32 = 10;

/// Configuration for a [`Pipeline`](crate::Pipeline)
///
/// # Examples
///
/// ```
/// use docket_pipeline::PipelineConfig;
///
/// // Default configuration (balanced)
/// let config = PipelineConfig::default();
/// assert_eq!(config.concurrency, 5);
///
/// // Many workers, short budget, no retries
/// let config = PipelineConfig::aggressive();
/// assert_eq!(config.concurrency, 10);
///
/// // Few workers, long budget, retries on transient failures
/// let config = PipelineConfig::lenient();
/// assert_eq!(config.max_retries, 2);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum number of records processed at once
    /// Default: 5
    pub concurrency: usize,

    /// Time budget for one record, retries included (seconds)
    /// Default: 120
    pub job_timeout_secs: u64,

    /// Share fetched documents between records that reference them
    /// Default: true
    pub cache_enabled: bool,

    /// Run the enrichment adapter on extracted text
    /// Default: false
    pub enrichment_enabled: bool,

    /// Extra attempts for transient fetch failures
    /// Default: 0
    pub max_retries: u32,

    /// Base delay before the first retry, doubled on each further retry (milliseconds)
    /// Default: 500
    pub retry_backoff_ms: u64,

    /// Log progress every N completed records
    /// Default: 50
    pub progress_interval: usize,

    /// Number of earlier summaries passed to the enrichment adapter
    /// Default: 3
    pub context_limit: usize,

    /// Level of detail requested from the enrichment adapter
    /// Default: standard
    pub detail: DetailLevel,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            job_timeout_secs: 120,
            cache_enabled: true,
            enrichment_enabled: false,
            max_retries: 0,
            retry_backoff_ms: 500,
            progress_interval: 50,
            context_limit: 3,
            detail: DetailLevel::Standard,
        }
    }
}

impl PipelineConfig {
    /// Aggressive configuration (many workers, short budget)
    ///
    /// Suitable for a fast upstream that tolerates parallel requests.
    pub fn aggressive() -> Self {
        Self {
            concurrency: 10,
            job_timeout_secs: 60,
            max_retries: 0,
            progress_interval: 100,
            ..Self::default()
        }
    }

    /// Lenient configuration (few workers, long budget, retries)
    ///
    /// Suitable for a slow or flaky upstream.
    pub fn lenient() -> Self {
        Self {
            concurrency: 2,
            job_timeout_secs: 300,
            max_retries: 2,
            retry_backoff_ms: 1_000,
            progress_interval: 25,
            ..Self::default()
        }
    }

    /// Get the per-job time budget as Duration
    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }

    /// Get the base retry delay as Duration
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.concurrency == 0 {
            return Err("concurrency must be at least 1".to_string());
        }
        if self.job_timeout_secs == 0 {
            return Err("job_timeout_secs must be greater than 0".to_string());
        }
        if self.max_retries > MAX_RETRIES_LIMIT {
            return Err(format!("max_retries must be at most {}", MAX_RETRIES_LIMIT));
        }
        if self.progress_interval == 0 {
            return Err("progress_interval must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize to TOML: {}", e))
    }
}
