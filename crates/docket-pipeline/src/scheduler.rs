//! Bounded-concurrency scheduler
//!
//! Runs one job per record with at most `concurrency` jobs in flight and
//! forwards each completion as soon as it happens. Every admitted or
//! unadmitted record leaves with exactly one [`RecordOutcome`].

use crate::cancel::{hard_cancelled, CancelHandle};
use crate::config::PipelineConfig;
use async_trait::async_trait;
use docket_domain::{BatchId, FailureReason, Outcome, Record, RecordOutcome};
use docket_extractor::CacheStats;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::{Id, JoinSet};
use tokio::time::{sleep, timeout};
use tracing::{debug, error, warn, Instrument};

/// Work done for one record
///
/// Implementations turn a failure into an [`Outcome::Failure`] instead of
/// returning an error; retry and timeout policy belong to the scheduler.
#[async_trait]
pub trait RecordProcessor: Send + Sync + 'static {
    /// Process one record
    async fn process(&self, record: &Record) -> Outcome;

    /// Called once before a batch starts
    fn start_batch(&self, _batch_id: &BatchId) {}

    /// Document cache counters, if the processor caches
    fn cache_stats(&self) -> Option<CacheStats> {
        None
    }
}

/// Scheduling limits, usually derived from [`PipelineConfig`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
    /// Maximum jobs in flight
    pub concurrency: usize,
    /// Budget for one record, retries included
    pub job_timeout: Duration,
    /// Extra attempts for retryable failures
    pub max_retries: u32,
    /// Delay before the first retry, doubled each time
    pub retry_backoff: Duration,
}

impl From<&PipelineConfig> for SchedulerSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            concurrency: config.concurrency.max(1),
            job_timeout: config.job_timeout(),
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff(),
        }
    }
}

/// Runs records through a [`RecordProcessor`] with bounded concurrency
pub struct Scheduler<P: RecordProcessor> {
    processor: Arc<P>,
    settings: SchedulerSettings,
}

impl<P: RecordProcessor> Scheduler<P> {
    /// Create a scheduler
    ///
    /// A concurrency of zero is treated as one.
    pub fn new(processor: Arc<P>, mut settings: SchedulerSettings) -> Self {
        settings.concurrency = settings.concurrency.max(1);
        Self {
            processor,
            settings,
        }
    }

    /// Start processing `records` in the background
    ///
    /// Completions arrive on the returned channel in completion order, one
    /// per record. Records must already carry their input positions.
    pub fn spawn(&self, records: Vec<Record>, cancel: CancelHandle) -> mpsc::Receiver<RecordOutcome> {
        let (tx, rx) = mpsc::channel(self.settings.concurrency * 2);
        let driver = Driver {
            processor: Arc::clone(&self.processor),
            settings: self.settings,
            cancel,
            tx,
        };
        tokio::spawn(driver.run(records).in_current_span());
        rx
    }
}

struct Driver<P: RecordProcessor> {
    processor: Arc<P>,
    settings: SchedulerSettings,
    cancel: CancelHandle,
    tx: mpsc::Sender<RecordOutcome>,
}

impl<P: RecordProcessor> Driver<P> {
    async fn run(self, records: Vec<Record>) {
        let total = records.len();
        let mut pending: VecDeque<Record> = records.into();
        let mut unresolved: HashMap<Id, Record> = HashMap::new();
        let mut jobs = JoinSet::new();

        loop {
            while jobs.len() < self.settings.concurrency && !self.cancel.is_cancelled() {
                let Some(record) = pending.pop_front() else {
                    break;
                };
                debug!(position = record.position, record = %record.id, "admitting");
                let handle = jobs.spawn(
                    run_job(
                        Arc::clone(&self.processor),
                        self.settings,
                        record.clone(),
                        self.cancel.clone(),
                    )
                    .in_current_span(),
                );
                unresolved.insert(handle.id(), record);
            }

            match jobs.join_next_with_id().await {
                Some(Ok((id, done))) => {
                    unresolved.remove(&id);
                    self.forward(done).await;
                }
                Some(Err(e)) => {
                    let Some(record) = unresolved.remove(&e.id()) else {
                        error!(error = %e, "unknown job did not report an outcome");
                        continue;
                    };
                    error!(position = record.position, record = %record.id, error = %e, "job panicked");
                    let reason = FailureReason::Internal {
                        message: "job panicked".to_string(),
                    };
                    self.forward(RecordOutcome::never_started(record, reason)).await;
                }
                None => break,
            }
        }

        if !pending.is_empty() {
            debug!(count = pending.len(), "cancelling unadmitted records");
        }
        for record in pending {
            self.forward(RecordOutcome::never_started(record, FailureReason::Cancelled))
                .await;
        }

        debug!(total, "scheduler finished");
    }

    async fn forward(&self, done: RecordOutcome) {
        if self.tx.send(done).await.is_err() && !self.cancel.is_cancelled() {
            warn!("Outcome receiver dropped, cancelling batch");
            self.cancel.hard();
        }
    }
}

async fn run_job<P: RecordProcessor>(
    processor: Arc<P>,
    settings: SchedulerSettings,
    record: Record,
    cancel: CancelHandle,
) -> RecordOutcome {
    let started = Instant::now();
    let attempts = AtomicU32::new(0);

    let outcome = {
        let work = attempt_with_retries(processor.as_ref(), &settings, &record, &attempts);
        tokio::select! {
            biased;
            _ = hard_cancelled(cancel.subscribe()) => Outcome::failure(FailureReason::Cancelled),
            result = timeout(settings.job_timeout, work) => match result {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(
                        position = record.position,
                        record = %record.id,
                        "job exceeded {:?}",
                        settings.job_timeout
                    );
                    Outcome::failure(FailureReason::Timeout {
                        after_ms: settings.job_timeout.as_millis() as u64,
                    })
                }
            },
        }
    };

    RecordOutcome {
        record,
        outcome,
        attempts: attempts.load(Ordering::Relaxed),
        elapsed_ms: started.elapsed().as_millis() as u64,
    }
}

async fn attempt_with_retries<P: RecordProcessor>(
    processor: &P,
    settings: &SchedulerSettings,
    record: &Record,
    attempts: &AtomicU32,
) -> Outcome {
    loop {
        let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;
        let outcome = processor.process(record).await;

        let retryable = outcome
            .failure_reason()
            .is_some_and(FailureReason::is_retryable);
        if !retryable || attempt > settings.max_retries {
            return outcome;
        }

        let delay = backoff_delay(settings.retry_backoff, attempt);
        debug!(
            position = record.position,
            attempt,
            "retrying in {:?}",
            delay
        );
        sleep(delay).await;
    }
}

/// Delay before retry number `attempt` (1-based)
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 1u32 << attempt.saturating_sub(1).min(16);
    base.saturating_mul(factor)
}
