//! Pipeline facade: batch and streaming delivery

use crate::cancel::CancelHandle;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, SequencerError};
use crate::ledger::FailureLedger;
use crate::metrics::{PipelineMetrics, ProgressTracker};
use crate::scheduler::{RecordProcessor, Scheduler, SchedulerSettings};
use crate::sequencer::Sequencer;
use docket_domain::{assign_positions, BatchId, FailureEntry, FailureReason, Record, RecordOutcome};
use docket_extractor::CacheStats;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, info_span, warn, Instrument};

/// Everything a batch run produced
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    /// Identifier of this run
    pub batch_id: BatchId,

    /// One outcome per input record, in input order
    pub outcomes: Vec<RecordOutcome>,

    /// Failed records, ordered by position
    pub failures: Vec<FailureEntry>,

    /// Counters for the run
    pub metrics: PipelineMetrics,
}

/// One event of a streaming run
///
/// Record events arrive in input order and are followed by exactly one
/// `Complete`. An `Error` event, if any, precedes `Complete`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// A record's final outcome
    Record(RecordOutcome),

    /// The batch finished
    Complete {
        /// Records in the batch
        total: usize,
        /// Records without text
        failed: usize,
    },

    /// The batch did not finish normally
    Error {
        /// Human-readable detail
        message: String,
    },
}

/// Runs batches of records through a [`RecordProcessor`]
///
/// # Examples
///
/// ```no_run
/// use docket_domain::Record;
/// use docket_extractor::{Extractor, ExtractorConfig, HttpSource, PdfTextParser};
/// use docket_pipeline::{ExtractionJob, Pipeline, PipelineConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = PipelineConfig::default();
/// let extractor_config = ExtractorConfig::default();
/// let extractor = Extractor::new(
///     HttpSource::new(&extractor_config)?,
///     PdfTextParser::new(),
///     &extractor_config,
/// );
/// let pipeline = Pipeline::new(config.clone(), ExtractionJob::new(extractor, &config))?;
///
/// let records = vec![Record::new(0, Some("https://council.example/20260115/phea20260115ag.htm".to_string()))];
/// let result = pipeline.run(records).await?;
/// println!("{}", result.metrics.summary());
/// # Ok(())
/// # }
/// ```
pub struct Pipeline<P: RecordProcessor> {
    config: PipelineConfig,
    processor: Arc<P>,
}

impl<P: RecordProcessor> Pipeline<P> {
    /// Create a pipeline
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Config` if the configuration is invalid.
    pub fn new(config: PipelineConfig, processor: P) -> Result<Self, PipelineError> {
        Self::from_shared(config, Arc::new(processor))
    }

    /// Create a pipeline around a shared processor
    pub fn from_shared(config: PipelineConfig, processor: Arc<P>) -> Result<Self, PipelineError> {
        config.validate().map_err(PipelineError::Config)?;
        Ok(Self {
            config,
            processor,
        })
    }

    /// The active configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The processor records run through
    pub fn processor(&self) -> &Arc<P> {
        &self.processor
    }

    /// Process a batch and return all outcomes at once
    ///
    /// Per-record failures are part of the result, never an `Err`.
    pub async fn run(&self, records: Vec<Record>) -> Result<PipelineResult, PipelineError> {
        self.run_with_cancel(records, CancelHandle::new()).await
    }

    /// Like [`run`](Self::run), cancellable through `cancel`
    ///
    /// The handle belongs to this batch only.
    pub async fn run_with_cancel(
        &self,
        records: Vec<Record>,
        cancel: CancelHandle,
    ) -> Result<PipelineResult, PipelineError> {
        let batch_id = BatchId::new();
        let span = info_span!("batch", %batch_id);
        self.run_batch(batch_id, records, cancel).instrument(span).await
    }

    async fn run_batch(
        &self,
        batch_id: BatchId,
        records: Vec<Record>,
        cancel: CancelHandle,
    ) -> Result<PipelineResult, PipelineError> {
        let (roster, mut completions) = self.start(&batch_id, records, cancel);
        let mut delivery = Delivery::new(roster.len(), self.config.progress_interval);
        let mut outcomes = Vec::with_capacity(roster.len());

        while let Some(done) = completions.recv().await {
            outcomes.extend(delivery.accept(done)?);
        }

        let missing = delivery.missing();
        if !missing.is_empty() {
            error!(count = missing.len(), "scheduler stopped before every record resolved");
            outcomes.extend(delivery.synthesize(&roster, &missing)?);
        }

        let result = delivery.finish(batch_id, outcomes, self.processor.cache_stats());
        info!(
            total = result.metrics.total,
            failed = result.failures.len(),
            "Batch complete"
        );
        Ok(result)
    }

    /// Process a batch and deliver outcomes as they become ready
    ///
    /// Dropping the receiver hard-cancels the batch.
    pub fn stream(&self, records: Vec<Record>) -> Result<mpsc::Receiver<PipelineEvent>, PipelineError> {
        self.stream_with_cancel(records, CancelHandle::new())
    }

    /// Like [`stream`](Self::stream), cancellable through `cancel`
    pub fn stream_with_cancel(
        &self,
        records: Vec<Record>,
        cancel: CancelHandle,
    ) -> Result<mpsc::Receiver<PipelineEvent>, PipelineError> {
        let batch_id = BatchId::new();
        let span = info_span!("batch", %batch_id);
        let _entered = span.enter();

        let (roster, completions) = self.start(&batch_id, records, cancel.clone());
        let (tx, rx) = mpsc::channel(self.config.concurrency * 2);
        let streamer = Streamer {
            delivery: Delivery::new(roster.len(), self.config.progress_interval),
            roster,
            cancel,
            tx,
        };
        tokio::spawn(streamer.run(completions).in_current_span());
        Ok(rx)
    }

    fn start(
        &self,
        batch_id: &BatchId,
        mut records: Vec<Record>,
        cancel: CancelHandle,
    ) -> (Vec<Record>, mpsc::Receiver<RecordOutcome>) {
        assign_positions(&mut records);
        info!(
            records = records.len(),
            concurrency = self.config.concurrency,
            "Starting batch"
        );
        self.processor.start_batch(batch_id);

        let roster = records.clone();
        let scheduler = Scheduler::new(
            Arc::clone(&self.processor),
            SchedulerSettings::from(&self.config),
        );
        (roster, scheduler.spawn(records, cancel))
    }
}

/// Ordering, ledger, metrics and progress for one batch
struct Delivery {
    sequencer: Sequencer<RecordOutcome>,
    ledger: FailureLedger,
    metrics: PipelineMetrics,
    progress: ProgressTracker,
}

impl Delivery {
    fn new(total: usize, progress_interval: usize) -> Self {
        Self {
            sequencer: Sequencer::new(total),
            ledger: FailureLedger::new(),
            metrics: PipelineMetrics::new(),
            progress: ProgressTracker::new(total, progress_interval),
        }
    }

    /// Take one completion and return whatever became deliverable
    fn accept(&mut self, done: RecordOutcome) -> Result<Vec<RecordOutcome>, SequencerError> {
        self.progress.observe(&done);
        self.sequencer.push(done.position(), done)?;

        let ready: Vec<RecordOutcome> = self.sequencer.drain().collect();
        for delivered in &ready {
            self.ledger.observe(delivered);
            self.metrics.record_outcome(delivered);
        }
        Ok(ready)
    }

    fn missing(&self) -> Vec<usize> {
        self.sequencer.missing()
    }

    /// Fill positions the scheduler never reported
    fn synthesize(
        &mut self,
        roster: &[Record],
        missing: &[usize],
    ) -> Result<Vec<RecordOutcome>, SequencerError> {
        let mut ready = Vec::new();
        for &position in missing {
            let reason = FailureReason::Internal {
                message: "no outcome reported".to_string(),
            };
            ready.extend(self.accept(RecordOutcome::never_started(
                roster[position].clone(),
                reason,
            ))?);
        }
        Ok(ready)
    }

    fn failed(&self) -> usize {
        self.ledger.len()
    }

    fn finish(
        mut self,
        batch_id: BatchId,
        outcomes: Vec<RecordOutcome>,
        cache: Option<CacheStats>,
    ) -> PipelineResult {
        if let Some(stats) = cache {
            self.metrics.record_cache(stats);
        }
        self.metrics.elapsed_ms = self.progress.elapsed().as_millis() as u64;
        PipelineResult {
            batch_id,
            outcomes,
            failures: self.ledger.export(),
            metrics: self.metrics,
        }
    }
}

struct Streamer {
    delivery: Delivery,
    roster: Vec<Record>,
    cancel: CancelHandle,
    tx: mpsc::Sender<PipelineEvent>,
}

impl Streamer {
    async fn run(mut self, mut completions: mpsc::Receiver<RecordOutcome>) {
        let total = self.roster.len();
        let mut fault: Option<String> = None;

        while let Some(done) = completions.recv().await {
            match self.delivery.accept(done) {
                Ok(ready) => {
                    if !self.emit_records(ready).await {
                        return;
                    }
                }
                Err(e) => {
                    error!(error = %e, "dropping out-of-sequence outcome");
                    fault.get_or_insert_with(|| e.to_string());
                }
            }
        }

        let missing = self.delivery.missing();
        if !missing.is_empty() {
            error!(count = missing.len(), "scheduler stopped before every record resolved");
            match self.delivery.synthesize(&self.roster, &missing) {
                Ok(ready) => {
                    if !self.emit_records(ready).await {
                        return;
                    }
                }
                Err(e) => {
                    fault.get_or_insert_with(|| e.to_string());
                }
            }
            fault.get_or_insert_with(|| format!("{} records produced no outcome", missing.len()));
        }

        if let Some(message) = fault {
            if self.tx.send(PipelineEvent::Error { message }).await.is_err() {
                return;
            }
        }

        let failed = self.delivery.failed();
        info!(total, failed, "Batch complete");
        let _ = self.tx.send(PipelineEvent::Complete { total, failed }).await;
    }

    /// Send record events; false if the consumer is gone
    async fn emit_records(&self, ready: Vec<RecordOutcome>) -> bool {
        for done in ready {
            if self.tx.send(PipelineEvent::Record(done)).await.is_err() {
                warn!("Event receiver dropped, cancelling batch");
                self.cancel.hard();
                return false;
            }
        }
        true
    }
}
