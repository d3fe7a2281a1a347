//! Metrics collection for pipeline runs

use docket_domain::{FailureStage, RecordOutcome};
use docket_extractor::CacheStats;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collected during a pipeline run
///
/// Tracks outcomes per failure stage, enrichment coverage, attempts and
/// document cache effectiveness.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineMetrics {
    /// Records that entered the run
    pub total: usize,

    /// Records with extracted text
    pub succeeded: usize,

    /// Failed records per stage
    pub failed: BTreeMap<FailureStage, usize>,

    /// Successful records that carry enrichment
    pub enriched: usize,

    /// Attempts made across all records
    pub attempts: u64,

    /// Document cache hits
    pub cache_hits: u64,

    /// Document loads actually performed
    pub cache_misses: u64,

    /// Requests that waited on another record's load
    pub cache_coalesced: u64,

    /// Wall-clock duration of the run in milliseconds
    pub elapsed_ms: u64,
}

impl PipelineMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one delivered outcome
    pub fn record_outcome(&mut self, done: &RecordOutcome) {
        self.total += 1;
        self.attempts += u64::from(done.attempts);
        match done.outcome.failure_reason() {
            Some(reason) => *self.failed.entry(reason.stage()).or_insert(0) += 1,
            None => {
                self.succeeded += 1;
                if done.outcome.enrichment().is_some() {
                    self.enriched += 1;
                }
            }
        }
    }

    /// Take over the counters of the document caches
    pub fn record_cache(&mut self, stats: CacheStats) {
        self.cache_hits = stats.hits;
        self.cache_misses = stats.misses;
        self.cache_coalesced = stats.coalesced;
    }

    /// Total failed records across all stages
    pub fn total_failed(&self) -> usize {
        self.failed.values().sum()
    }

    /// Successful records without enrichment
    pub fn unenriched(&self) -> usize {
        self.succeeded - self.enriched
    }

    /// Share of records with text, between 0 and 1
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.succeeded as f64 / self.total as f64
    }

    /// Generate a summary report of metrics
    pub fn summary(&self) -> String {
        let mut lines = vec![
            "Pipeline Metrics Summary".to_string(),
            "========================".to_string(),
            format!("Records: {}", self.total),
            format!(
                "Succeeded: {} ({:.1}%)",
                self.succeeded,
                self.success_rate() * 100.0
            ),
            format!("Failed: {}", self.total_failed()),
            format!("Elapsed: {:.1}s", self.elapsed_ms as f64 / 1000.0),
            String::new(),
        ];

        if !self.failed.is_empty() {
            lines.push("Failures by stage:".to_string());
            for (stage, count) in &self.failed {
                lines.push(format!("  {}: {}", stage, count));
            }
            lines.push(String::new());
        }

        if self.enriched > 0 {
            lines.push(format!(
                "Enrichment: {} enriched, {} without",
                self.enriched,
                self.unenriched()
            ));
        }

        lines.push(format!(
            "Document cache: {} hits, {} loads, {} coalesced",
            self.cache_hits, self.cache_misses, self.cache_coalesced
        ));
        lines.push(format!("Attempts: {}", self.attempts));

        lines.join("\n")
    }
}

/// Periodic progress reporting in completion order
#[derive(Debug)]
pub(crate) struct ProgressTracker {
    total: usize,
    interval: usize,
    started: Instant,
    completed: usize,
    succeeded: usize,
    failed: usize,
}

impl ProgressTracker {
    pub(crate) fn new(total: usize, interval: usize) -> Self {
        Self {
            total,
            interval: interval.max(1),
            started: Instant::now(),
            completed: 0,
            succeeded: 0,
            failed: 0,
        }
    }

    /// Count a completion and log every `interval` of them
    pub(crate) fn observe(&mut self, done: &RecordOutcome) {
        self.completed += 1;
        if done.outcome.is_success() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }

        if self.completed % self.interval == 0 && self.completed < self.total {
            let elapsed = self.started.elapsed();
            let rate = rate_per_sec(self.completed, elapsed);
            let remaining = self.total - self.completed;
            let eta_secs = if rate > 0.0 { remaining as f64 / rate } else { 0.0 };
            info!(
                completed = self.completed,
                total = self.total,
                succeeded = self.succeeded,
                failed = self.failed,
                "Progress: {}/{} ({:.2} records/s, ETA {:.0}s)",
                self.completed,
                self.total,
                rate,
                eta_secs
            );
        }
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

fn rate_per_sec(count: usize, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        count as f64 / secs
    } else {
        0.0
    }
}
