//! Docket Pipeline
//!
//! Runs batches of council meeting records through extraction with bounded
//! concurrency and delivers one outcome per record, in input order.
//!
//! # Overview
//!
//! The pipeline is responsible for:
//! - **Scheduling**: at most `concurrency` jobs in flight, each under a time budget
//! - **Retries**: transient fetch failures retried with exponential backoff
//! - **Ordering**: completions reordered into input order before delivery
//! - **Failure ledger**: every failed record listed with its reason
//! - **Cancellation**: graceful (drain in-flight) or hard (abandon in-flight)
//!
//! # Architecture
//!
//! ```text
//! records → Scheduler (JoinSet, ≤ N jobs) → completions (any order)
//!                                               ↓
//!                              Sequencer → outcomes (input order)
//!                                               ↓
//!                          FailureLedger + PipelineMetrics
//! ```
//!
//! # Delivery Modes
//!
//! ## Batch
//!
//! ```no_run
//! use docket_domain::Record;
//! use docket_extractor::{Extractor, ExtractorConfig, HttpSource, PdfTextParser};
//! use docket_pipeline::{ExtractionJob, Pipeline, PipelineConfig};
//!
//! # async fn example(records: Vec<Record>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig::default();
//! let extractor_config = ExtractorConfig::default();
//! let extractor = Extractor::new(HttpSource::new(&extractor_config)?, PdfTextParser::new(), &extractor_config);
//! let pipeline = Pipeline::new(config.clone(), ExtractionJob::new(extractor, &config))?;
//!
//! let result = pipeline.run(records).await?;
//! println!("{}", result.metrics.summary());
//! for failure in &result.failures {
//!     println!("{} {}: {}", failure.position, failure.record_id, failure.reason);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Streaming
//!
//! ```no_run
//! # use docket_domain::Record;
//! # use docket_pipeline::{Pipeline, PipelineEvent, RecordProcessor};
//! # async fn example<P: RecordProcessor>(pipeline: Pipeline<P>, records: Vec<Record>) -> Result<(), Box<dyn std::error::Error>> {
//! let mut events = pipeline.stream(records)?;
//! while let Some(event) = events.recv().await {
//!     match event {
//!         PipelineEvent::Record(done) => println!("{}: {}", done.position(), done.outcome.is_success()),
//!         PipelineEvent::Error { message } => eprintln!("{}", message),
//!         PipelineEvent::Complete { total, failed } => println!("{} records, {} failed", total, failed),
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! ```toml
//! [pipeline]
//! concurrency = 5
//! job_timeout_secs = 120
//! cache_enabled = true
//! enrichment_enabled = false
//! max_retries = 0
//! retry_backoff_ms = 500
//! progress_interval = 50
//! context_limit = 3
//! detail = "standard"
//! ```

#![warn(missing_docs)]

mod cancel;
mod config;
mod error;
mod job;
mod ledger;
mod metrics;
mod pipeline;
mod scheduler;
mod sequencer;

pub use cancel::{CancelHandle, CancelMode};
pub use config::PipelineConfig;
pub use error::{PipelineError, SequencerError};
pub use job::ExtractionJob;
pub use ledger::FailureLedger;
pub use metrics::PipelineMetrics;
pub use pipeline::{Pipeline, PipelineEvent, PipelineResult};
pub use scheduler::{RecordProcessor, Scheduler, SchedulerSettings};
pub use sequencer::Sequencer;
