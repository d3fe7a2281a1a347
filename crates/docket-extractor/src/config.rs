//! Configuration for the Extractor and the enrichment adapter

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Text chunking strategy used to fit long minutes into a prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChunkStrategy {
    /// Split by paragraphs (double newlines)
    #[default]
    ByParagraph,
    /// Split by sections (agenda headings or numbered items)
    BySection,
}

/// Configuration for the Extractor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Visible text of the landing-page link that points at the minutes
    pub link_text: String,

    /// Path suffixes that mark a reference as a direct document link
    pub document_suffixes: Vec<String>,

    /// Timeout for a single HTTP request (seconds)
    pub request_timeout_secs: u64,

    /// User-Agent header sent with every request
    pub user_agent: String,
}

impl ExtractorConfig {
    /// Get the request timeout as a Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.link_text.trim().is_empty() {
            return Err("link_text must not be empty".to_string());
        }
        if self.request_timeout_secs == 0 {
            return Err("request_timeout_secs must be greater than 0".to_string());
        }
        if self.document_suffixes.iter().any(|s| s.trim().is_empty()) {
            return Err("document_suffixes must not contain empty entries".to_string());
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

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            link_text: "read the minutes".to_string(),
            document_suffixes: vec![".pdf".to_string(), ".txt".to_string()],
            request_timeout_secs: 60,
            user_agent: format!("docket/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Configuration for the LLM-backed enrichment adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Maximum characters of meeting text placed in a prompt
    pub max_prompt_chars: usize,

    /// Maximum time for a single enrichment call (seconds)
    pub enrichment_timeout_secs: u64,

    /// How text over the budget is cut down
    pub chunk_strategy: ChunkStrategy,
}

impl EnrichmentConfig {
    /// Get the enrichment timeout as a Duration
    pub fn enrichment_timeout(&self) -> Duration {
        Duration::from_secs(self.enrichment_timeout_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_prompt_chars == 0 {
            return Err("max_prompt_chars must be greater than 0".to_string());
        }
        if self.enrichment_timeout_secs == 0 {
            return Err("enrichment_timeout_secs must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Aggressive preset: small prompts, short timeout
    pub fn aggressive() -> Self {
        Self {
            max_prompt_chars: 6_000,
            enrichment_timeout_secs: 30,
            chunk_strategy: ChunkStrategy::ByParagraph,
        }
    }

    /// Lenient preset: large prompts, patient timeout
    pub fn lenient() -> Self {
        Self {
            max_prompt_chars: 40_000,
            enrichment_timeout_secs: 300,
            chunk_strategy: ChunkStrategy::BySection,
        }
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

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            max_prompt_chars: 16_000,
            enrichment_timeout_secs: 120,
            chunk_strategy: ChunkStrategy::ByParagraph,
        }
    }
}
