//! Docket Domain Layer
//!
//! This crate contains the data model shared by every other Docket crate:
//! the records that enter the extraction pipeline, the single outcome each
//! one leaves with, and the trait interfaces for the collaborators the
//! pipeline talks to over the network.
//!
//! ## Key Concepts
//!
//! - **Record**: one unit of input work with a stable identity, an input
//!   position and a document reference
//! - **Outcome**: success (text plus optional enrichment) or a typed failure
//! - **Failure stage**: where in the pipeline a record gave up
//! - **Enrichment**: best-effort structured data derived from the text
//!
//! ## Architecture
//!
//! - Pure data and trait definitions only
//! - Network implementations live in `docket-extractor` and `docket-llm`
//! - Scheduling and ordering live in `docket-pipeline`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod enrichment;
pub mod outcome;
pub mod record;
pub mod traits;

// Re-exports for convenience
pub use enrichment::{DetailLevel, Enrichment, EnrichmentRequest, PriorSummary};
pub use outcome::{FailureEntry, FailureReason, FailureStage, Outcome, RecordOutcome};
pub use record::{assign_positions, BatchId, Record, RecordId};
pub use traits::{AdapterError, FetchedDocument};
