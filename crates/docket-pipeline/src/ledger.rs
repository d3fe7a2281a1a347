//! Failure ledger for a batch

use docket_domain::{FailureEntry, FailureReason, FailureStage, RecordId, RecordOutcome};
use std::collections::BTreeMap;

/// Append-only list of the records that produced no text
///
/// Informational only; the ledger never affects scheduling.
#[derive(Debug, Clone, Default)]
pub struct FailureLedger {
    entries: Vec<FailureEntry>,
}

impl FailureLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one failure
    pub fn record(&mut self, position: usize, record_id: RecordId, reason: FailureReason) {
        self.entries.push(FailureEntry {
            position,
            record_id,
            reason,
        });
    }

    /// Record the outcome if it is a failure
    pub fn observe(&mut self, done: &RecordOutcome) {
        if let Some(reason) = done.outcome.failure_reason() {
            self.record(done.position(), done.record.id.clone(), reason.clone());
        }
    }

    /// All entries, ordered by position
    pub fn export(&self) -> Vec<FailureEntry> {
        let mut entries = self.entries.clone();
        entries.sort_by_key(|entry| entry.position);
        entries
    }

    /// Number of failures recorded
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no failures were recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Failure counts per stage
    pub fn count_by_stage(&self) -> BTreeMap<FailureStage, usize> {
        let mut counts = BTreeMap::new();
        for entry in &self.entries {
            *counts.entry(entry.reason.stage()).or_insert(0) += 1;
        }
        counts
    }
}
