//! Enrichment module - structured data derived from extracted text

use crate::record::RecordId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How much detail the enrichment service should produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailLevel {
    /// One or two sentences, few topics
    Brief,
    /// A paragraph summary with the main decisions
    #[default]
    Standard,
    /// Thorough summary covering every agenda item
    Detailed,
}

impl DetailLevel {
    /// Get the level name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            DetailLevel::Brief => "brief",
            DetailLevel::Standard => "standard",
            DetailLevel::Detailed => "detailed",
        }
    }

    /// Parse a level from a string (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "brief" => Some(DetailLevel::Brief),
            "standard" => Some(DetailLevel::Standard),
            "detailed" => Some(DetailLevel::Detailed),
            _ => None,
        }
    }
}

/// Structured data produced by the enrichment service
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Enrichment {
    /// Plain-language summary of the meeting
    pub summary: String,

    /// Subjects discussed
    #[serde(default)]
    pub topics: Vec<String>,

    /// Motions carried, bylaws enacted, referrals made
    #[serde(default)]
    pub decisions: Vec<String>,

    /// Model that produced this data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Summary of an earlier result, passed as context to the enrichment service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorSummary {
    /// Identity of the earlier record
    pub record_id: RecordId,

    /// Its summary
    pub summary: String,
}

/// Input to the enrichment service
#[derive(Debug, Clone)]
pub struct EnrichmentRequest {
    /// Record being enriched
    pub record_id: RecordId,

    /// Extracted text
    pub text: Arc<str>,

    /// Summaries of earlier records, oldest first
    pub prior_summaries: Vec<PriorSummary>,

    /// Requested level of detail
    pub detail: DetailLevel,
}

impl EnrichmentRequest {
    /// Create a request with no prior context at the default detail level
    pub fn new(record_id: RecordId, text: Arc<str>) -> Self {
        Self {
            record_id,
            text,
            prior_summaries: Vec::new(),
            detail: DetailLevel::default(),
        }
    }

    /// Set the prior summaries
    pub fn with_prior_summaries(mut self, prior: Vec<PriorSummary>) -> Self {
        self.prior_summaries = prior;
        self
    }

    /// Set the detail level
    pub fn with_detail(mut self, detail: DetailLevel) -> Self {
        self.detail = detail;
        self
    }
}
