//! Configuration management for the CLI.

use crate::error::{CliError, Result};
use docket_extractor::{EnrichmentConfig, ExtractorConfig};
use docket_pipeline::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// CLI configuration.
///
/// Every section is optional in the file; missing sections and fields take
/// their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Scheduling, retries and enrichment switches
    pub pipeline: PipelineConfig,

    /// Link resolution and HTTP settings
    pub extractor: ExtractorConfig,

    /// Prompt budget for enrichment
    pub enrichment: EnrichmentConfig,

    /// Council meetings API
    pub source: SourceConfig,

    /// Ollama connection used when enrichment is enabled
    pub ollama: OllamaConfig,

    /// Global output settings
    pub output: OutputSettings,
}

/// Council meetings API settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Meetings list endpoint
    pub api_url: String,

    /// Base prepended to each meeting's relative URL
    pub site_base: String,

    /// Value of the `type` query parameter
    pub meeting_type: String,

    /// API key (prefer `DOCKET_API_KEY` over storing it here)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Header the API key is sent in
    pub api_key_header: String,

    /// Request timeout (seconds)
    pub timeout_secs: u64,
}

impl SourceConfig {
    /// Get the request timeout as a Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.vancouver.ca/App/CouncilMeetings/CouncilMeetings.API/api/CouncilMeetings"
                .to_string(),
            site_base: "https://council.vancouver.ca".to_string(),
            meeting_type: "previous".to_string(),
            api_key: None,
            api_key_header: "X-API-Key".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Ollama connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    /// Server endpoint
    pub endpoint: String,

    /// Model name
    pub model: String,

    /// Request timeout (seconds)
    pub timeout_secs: u64,

    /// Retries on transient errors
    pub max_retries: u32,
}

impl OllamaConfig {
    /// Get the request timeout as a Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            endpoint: docket_llm::ollama::DEFAULT_ENDPOINT.to_string(),
            model: "llama3.1".to_string(),
            timeout_secs: docket_llm::ollama::DEFAULT_TIMEOUT_SECS,
            max_retries: docket_llm::ollama::DEFAULT_MAX_RETRIES,
        }
    }
}

/// Global output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Enable colored output
    pub color: bool,

    /// Default output format
    pub format: OutputFormat,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            color: true,
            format: OutputFormat::Table,
        }
    }
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Table format
    Table,
    /// JSON format
    Json,
    /// Quiet (minimal) format
    Quiet,
}

impl Config {
    /// Get the default configuration file path.
    pub fn default_path() -> Result<PathBuf> {
        let dir = dirs::config_dir()
            .ok_or_else(|| CliError::Config("Could not find config directory".into()))?;
        Ok(dir.join("docket").join("config.toml"))
    }

    /// Load configuration.
    ///
    /// An explicit path must exist. The default path is optional and falls
    /// back to defaults when absent.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = Self::default_path()?;
                if path.exists() {
                    Self::from_file(&path)?
                } else {
                    Self::default()
                }
            }
        };
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            CliError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Ok(toml::from_str(&contents)?)
    }

    /// Save configuration to file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| CliError::Config(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<()> {
        self.pipeline
            .validate()
            .map_err(|e| CliError::Config(format!("[pipeline] {}", e)))?;
        self.extractor
            .validate()
            .map_err(|e| CliError::Config(format!("[extractor] {}", e)))?;
        self.enrichment
            .validate()
            .map_err(|e| CliError::Config(format!("[enrichment] {}", e)))?;
        if self.source.api_url.trim().is_empty() {
            return Err(CliError::Config("[source] api_url must not be empty".into()));
        }
        if self.source.timeout_secs == 0 {
            return Err(CliError::Config(
                "[source] timeout_secs must be greater than 0".into(),
            ));
        }
        if self.ollama.model.trim().is_empty() {
            return Err(CliError::Config("[ollama] model must not be empty".into()));
        }
        Ok(())
    }
}
