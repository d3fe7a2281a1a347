//! Docket Extractor
//!
//! Turns council meeting records into the plain text of their minutes, and
//! optionally into structured summaries.
//!
//! # Overview
//!
//! A record carries a reference to either a landing page or the minutes
//! document itself. The Extractor resolves landing pages to the document
//! link ("read the minutes"), downloads the document once no matter how many
//! records point at it, and parses it into text.
//!
//! # Architecture
//!
//! ```text
//! Record → resolve (link cache) → download + parse (text cache) → Arc<str>
//!                                                   ↓
//!                                   LlmEnricher → LLM → Enrichment
//! ```
//!
//! # Key Features
//!
//! - **Single-flight caching**: concurrent requests for one document share one download
//! - **Link resolution**: absolute, root-relative and relative minutes links
//! - **PDF parsing**: page-by-page text extraction off the async executor
//! - **Enrichment**: prompt building, budget trimming and tolerant JSON parsing
//!
//! # Example Usage
//!
//! ```no_run
//! use docket_domain::Record;
//! use docket_extractor::{Extractor, ExtractorConfig, HttpSource, PdfTextParser};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ExtractorConfig::default();
//! let source = HttpSource::new(&config)?;
//! let extractor = Extractor::new(source, PdfTextParser::new(), &config);
//!
//! let record = Record::new(0, Some("https://council.example/20260115/phea20260115ag.htm".to_string()));
//! let text = extractor.extract(&record).await?;
//! println!("{} characters of minutes", text.len());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod cache;
mod chunking;
mod config;
mod enricher;
mod error;
mod extractor;
mod http;
mod mock;
mod parser;
mod prompt;
mod resolver;
mod response;


pub use cache::{CacheEntry, CacheStats, DocumentCache};
pub use chunking::TextChunker;
pub use config::{ChunkStrategy, EnrichmentConfig, ExtractorConfig};
pub use enricher::LlmEnricher;
pub use error::ExtractError;
pub use extractor::Extractor;
pub use http::HttpSource;
pub use mock::{MockSource, MockTransportError};
pub use parser::{html_to_text, ParseError, PdfTextParser};
pub use prompt::PromptBuilder;
pub use resolver::{join_url, LinkResolver};
pub use response::parse_enrichment_response;
