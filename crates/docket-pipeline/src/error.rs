//! Error types for pipeline operations
//!
//! Per-record failures are data ([`FailureReason`](docket_domain::FailureReason)),
//! not errors. Only problems with the batch as a whole end up here.

use thiserror::Error;

/// Errors that stop a whole pipeline run
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Ordered delivery broke down
    #[error("Sequencer error: {0}")]
    Sequencer(#[from] SequencerError),
}

/// Errors from the ordered delivery buffer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SequencerError {
    /// Position was already pushed or already released
    #[error("Duplicate outcome for position {0}")]
    Duplicate(usize),

    /// Position is past the end of the batch
    #[error("Position {position} out of range (batch of {total})")]
    OutOfRange {
        /// Offending position
        position: usize,
        /// Number of records in the batch
        total: usize,
    },
}
