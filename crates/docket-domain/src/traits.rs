//! Trait definitions for external interactions
//!
//! These traits define the boundaries between the pipeline and the network.
//! Implementations live in other crates (`docket-extractor`, `docket-llm`).

use crate::enrichment::{Enrichment, EnrichmentRequest};
use async_trait::async_trait;
use thiserror::Error;

/// A document (or landing page) as returned by a [`DocumentSource`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedDocument {
    /// Final URL the body was read from
    pub url: String,

    /// HTTP status code
    pub status: u16,

    /// Content-Type header, if any
    pub content_type: Option<String>,

    /// Raw body bytes
    pub body: Vec<u8>,
}

impl FetchedDocument {
    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body decoded as UTF-8, replacing invalid sequences
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Retrieves raw bytes for a URL
///
/// Implemented by the infrastructure layer (`HttpSource` in docket-extractor).
/// Non-2xx responses are returned as `Ok` with their status; `Err` is reserved
/// for transport failures.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Error type for transport failures
    type Error: std::fmt::Display + Send;

    /// Fetch the given URL
    async fn get(&self, url: &str) -> Result<FetchedDocument, Self::Error>;
}

/// Turns document bytes into plain text
///
/// Parsing is CPU-bound and synchronous; callers move it off the async
/// executor.
pub trait DocumentParser: Send + Sync {
    /// Error type for unreadable documents
    type Error: std::fmt::Display + Send;

    /// Extract plain text from a fetched document
    fn parse(&self, document: &FetchedDocument) -> Result<String, Self::Error>;
}

/// Trait for LLM provider operations
///
/// Implemented by the infrastructure layer (docket-llm)
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Error type for LLM operations
    type Error: std::fmt::Display + Send;

    /// Generate text completion
    async fn generate(&self, prompt: &str) -> Result<String, Self::Error>;

    /// Name of the model behind this provider
    fn model_name(&self) -> &str;
}

/// Errors from the enrichment service
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    /// The service could not be reached or refused the request
    #[error("Enrichment service error: {0}")]
    Service(String),

    /// The service answered with something that is not the expected structure
    #[error("Invalid enrichment response: {0}")]
    InvalidResponse(String),

    /// The call exceeded its time budget
    #[error("Enrichment timed out")]
    Timeout,
}

/// Derives structured data from extracted text
///
/// Treated as slow and independently failable per call. The pipeline never
/// fails a record because of it.
#[async_trait]
pub trait EnrichmentAdapter: Send + Sync {
    /// Enrich one record's text
    async fn enrich(&self, request: &EnrichmentRequest) -> Result<Enrichment, AdapterError>;
}
