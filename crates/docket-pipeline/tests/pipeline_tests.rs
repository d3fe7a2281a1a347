//! Integration tests for docket-pipeline
//!
//! These tests run whole batches through the scheduler, sequencer and
//! ledger against a scripted document source.

use async_trait::async_trait;
use docket_domain::{FailureReason, FailureStage, Outcome, Record, RecordOutcome};
use docket_extractor::{
    CacheStats, EnrichmentConfig, Extractor, ExtractorConfig, LlmEnricher, MockSource,
    PdfTextParser,
};
use docket_llm::MockProvider;
use docket_pipeline::{
    CancelHandle, CancelMode, ExtractionJob, Pipeline, PipelineConfig, PipelineError,
    PipelineEvent, RecordProcessor,
};
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio_test::assert_ok;

type Job = ExtractionJob<MockSource, PdfTextParser>;

const LANDING: &str = "https://council.example/20260115/phea20260115ag.htm";
const MINUTES: &str = "https://council.example/20260115/documents/phea20260115min.txt";

fn doc(i: usize) -> String {
    format!("https://council.example/minutes/{}.txt", i)
}

fn job(source: &MockSource, config: &PipelineConfig) -> Job {
    let extractor = Extractor::new(source.clone(), PdfTextParser::new(), &ExtractorConfig::default());
    ExtractionJob::new(extractor, config)
}

fn pipeline(source: &MockSource, config: PipelineConfig) -> Pipeline<Job> {
    let job = job(source, &config);
    Pipeline::new(config, job).unwrap()
}

fn config(concurrency: usize) -> PipelineConfig {
    PipelineConfig {
        concurrency,
        ..PipelineConfig::default()
    }
}

/// Serve `n` distinct minutes documents, each with the given latency
fn serve_docs(source: &MockSource, n: usize, latency: Duration) -> Vec<Record> {
    (0..n)
        .map(|i| {
            source
                .text(&doc(i), &format!("Minutes of meeting {}", i))
                .latency(&doc(i), latency);
            Record::new(i, Some(doc(i)))
        })
        .collect()
}

fn successes(outcomes: &[RecordOutcome]) -> usize {
    outcomes.iter().filter(|d| d.outcome.is_success()).count()
}

/// Wraps a processor to observe concurrency and trigger cancellation
struct Observed<P> {
    inner: P,
    active: AtomicUsize,
    peak: AtomicUsize,
    completed: AtomicUsize,
    cancel_after: Option<(usize, CancelMode)>,
    cancel: OnceLock<CancelHandle>,
}

impl<P> Observed<P> {
    fn new(inner: P) -> Self {
        Self {
            inner,
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            cancel_after: None,
            cancel: OnceLock::new(),
        }
    }

    fn cancel_after(mut self, completed: usize, mode: CancelMode) -> Self {
        self.cancel_after = Some((completed, mode));
        self
    }
}

#[async_trait]
impl<P: RecordProcessor> RecordProcessor for Observed<P> {
    async fn process(&self, record: &Record) -> Outcome {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let outcome = self.inner.process(record).await;
        self.active.fetch_sub(1, Ordering::SeqCst);

        let completed = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        if let (Some((after, mode)), Some(cancel)) = (self.cancel_after, self.cancel.get()) {
            if completed == after {
                match mode {
                    CancelMode::Graceful => cancel.graceful(),
                    CancelMode::Hard => cancel.hard(),
                }
            }
        }
        outcome
    }

    fn cache_stats(&self) -> Option<CacheStats> {
        self.inner.cache_stats()
    }
}

/// Processor that sleeps for the record's `delay_ms` metadata
struct Sleepy;

#[async_trait]
impl RecordProcessor for Sleepy {
    async fn process(&self, record: &Record) -> Outcome {
        let delay = record
            .metadata
            .get("delay_ms")
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        Outcome::success(record.id.to_string())
    }
}

#[tokio::test]
async fn test_invalid_config_fails_before_processing() {
    let source = MockSource::new();
    let config = PipelineConfig {
        job_timeout_secs: 0,
        ..PipelineConfig::default()
    };
    let job = job(&source, &config);

    let result = Pipeline::new(config, job);
    assert!(matches!(result, Err(PipelineError::Config(_))));
    assert_eq!(source.total_calls(), 0);
}

#[tokio::test]
async fn test_batch_outcomes_are_complete_and_ordered() {
    let source = MockSource::new();
    let mut records = serve_docs(&source, 12, Duration::from_millis(5));
    // Early records are the slowest, so completion order differs from input order
    for (i, record) in records.iter().enumerate().take(4) {
        source.latency(record.document_ref.as_deref().unwrap(), Duration::from_millis(60 - 10 * i as u64));
    }
    records.push(Record::new(12, None));

    let result = assert_ok!(pipeline(&source, config(4)).run(records).await);

    let positions: Vec<_> = result.outcomes.iter().map(RecordOutcome::position).collect();
    assert_eq!(positions, (0..13).collect::<Vec<_>>());
    assert_eq!(successes(&result.outcomes), 12);
    assert_eq!(result.outcomes[3].outcome.text(), Some("Minutes of meeting 3"));
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].position, 12);
    assert_eq!(result.metrics.total, 13);
}

#[tokio::test]
async fn test_shared_failing_reference_scenario() {
    // 10 records, concurrency 3, positions 0 and 9 share a reference that fails
    let failing = "https://council.example/minutes/broken.txt";
    let source = MockSource::new();
    source.status(failing, 404);

    let mut records = serve_docs(&source, 10, Duration::from_millis(20));
    records[0] = Record::new(0, Some(failing.to_string()));
    records[9] = Record::new(9, Some(failing.to_string()));

    let result = pipeline(&source, config(3)).run(records).await.unwrap();

    assert_eq!(result.outcomes.len(), 10);
    assert_eq!(successes(&result.outcomes), 8);
    assert_eq!(result.failures.len(), 2);
    for failure in &result.failures {
        assert!([0, 9].contains(&failure.position));
        assert_eq!(failure.reason.stage(), FailureStage::Fetch);
        assert_eq!(
            failure.reason,
            FailureReason::Fetch {
                status: Some(404),
                message: "document download failed".to_string()
            }
        );
    }
    // Failures are not cached, so the second record fetches again
    assert_eq!(source.calls(failing), 2);
}

#[tokio::test]
async fn test_empty_reference_makes_no_network_call() {
    let source = MockSource::new();
    let pipeline = pipeline(&source, config(2));

    let result = pipeline
        .run(vec![Record::new(0, Some("   ".to_string()))])
        .await
        .unwrap();

    assert_eq!(
        result.outcomes[0].outcome.failure_reason(),
        Some(&FailureReason::MissingReference)
    );
    assert_eq!(result.failures[0].reason.stage(), FailureStage::Lookup);
    assert_eq!(source.total_calls(), 0);
    assert_eq!(result.metrics.cache_misses, 0);
    assert_eq!(result.metrics.cache_hits, 0);
}

#[tokio::test]
async fn test_shared_reference_fetched_once() {
    let source = MockSource::new();
    source
        .page(
            LANDING,
            &format!("<a href=\"{}\">Read the minutes</a>", MINUTES),
        )
        .latency(LANDING, Duration::from_millis(30))
        .text(MINUTES, "Shared minutes")
        .latency(MINUTES, Duration::from_millis(30));

    let records: Vec<Record> = (0..6).map(|i| Record::new(i, Some(LANDING.to_string()))).collect();
    let result = pipeline(&source, config(6)).run(records).await.unwrap();

    assert_eq!(source.calls(LANDING), 1);
    assert_eq!(source.calls(MINUTES), 1);
    let texts: Vec<_> = result.outcomes.iter().map(|d| d.outcome.text()).collect();
    assert!(texts.iter().all(|t| *t == Some("Shared minutes")));
    assert_eq!(result.metrics.cache_misses, 2);
}

#[tokio::test]
async fn test_cache_disabled_fetches_every_time() {
    let source = MockSource::new();
    source.text(MINUTES, "Shared minutes");

    let config = PipelineConfig {
        cache_enabled: false,
        ..config(2)
    };
    let records: Vec<Record> = (0..4).map(|i| Record::new(i, Some(MINUTES.to_string()))).collect();
    let result = pipeline(&source, config).run(records).await.unwrap();

    assert_eq!(successes(&result.outcomes), 4);
    assert_eq!(source.calls(MINUTES), 4);
}

#[tokio::test]
async fn test_failure_isolation() {
    let source = MockSource::new();
    let records = serve_docs(&source, 8, Duration::from_millis(5));
    let baseline = pipeline(&source, config(3)).run(records.clone()).await.unwrap();

    let faulty = MockSource::new();
    serve_docs(&faulty, 8, Duration::from_millis(5));
    faulty.status(&doc(5), 500);
    let injected = pipeline(&faulty, config(3)).run(records).await.unwrap();

    assert_eq!(injected.outcomes.len(), 8);
    for (a, b) in baseline.outcomes.iter().zip(&injected.outcomes) {
        if a.position() == 5 {
            assert!(!b.outcome.is_success());
        } else {
            assert_eq!(a.outcome, b.outcome);
        }
    }
}

#[tokio::test]
async fn test_bounded_concurrency() {
    let source = MockSource::new();
    let records = serve_docs(&source, 12, Duration::from_millis(15));
    let config = config(3);
    let observed = Observed::new(job(&source, &config));
    let pipeline = Pipeline::new(config, observed).unwrap();

    let result = pipeline.run(records).await.unwrap();

    assert_eq!(result.outcomes.len(), 12);
    assert!(pipeline.processor().peak.load(Ordering::SeqCst) <= 3);
}

#[tokio::test]
async fn test_timeout_becomes_failure() {
    let source = MockSource::new();
    let records = serve_docs(&source, 3, Duration::from_millis(5));
    source.latency(&doc(1), Duration::from_secs(5));

    let config = PipelineConfig {
        job_timeout_secs: 1,
        ..config(3)
    };
    let result = pipeline(&source, config).run(records).await.unwrap();

    assert_eq!(successes(&result.outcomes), 2);
    assert_eq!(
        result.outcomes[1].outcome.failure_reason(),
        Some(&FailureReason::Timeout { after_ms: 1000 })
    );
}

#[tokio::test]
async fn test_transient_failures_retried() {
    let source = MockSource::new();
    source.transport_error(MINUTES, "connection reset by peer");

    let config = PipelineConfig {
        max_retries: 2,
        retry_backoff_ms: 10,
        ..config(1)
    };
    let pipeline = pipeline(&source, config);
    let result = pipeline
        .run(vec![Record::new(0, Some(MINUTES.to_string()))])
        .await
        .unwrap();

    assert_eq!(result.outcomes[0].attempts, 3);
    assert_eq!(source.calls(MINUTES), 3);
    assert_eq!(result.failures[0].reason, FailureReason::Fetch {
        status: None,
        message: "connection reset by peer".to_string()
    });
}

#[tokio::test]
async fn test_landing_page_without_link_is_not_retried() {
    let source = MockSource::new();
    source.page(LANDING, "<a href=\"/agenda.pdf\">Agenda</a>");

    let config = PipelineConfig {
        max_retries: 2,
        retry_backoff_ms: 10,
        ..config(1)
    };
    let result = pipeline(&source, config)
        .run(vec![Record::new(0, Some(LANDING.to_string()))])
        .await
        .unwrap();

    assert_eq!(result.outcomes[0].attempts, 1);
    assert_eq!(source.calls(LANDING), 1);
    assert_eq!(result.failures[0].reason.stage(), FailureStage::Fetch);
    assert_eq!(
        result.failures[0].reason,
        FailureReason::Link {
            message: "no 'read the minutes' link found".to_string()
        }
    );
}

#[tokio::test]
async fn test_failing_enrichment_keeps_text() {
    for provider in [MockProvider::failing(), MockProvider::new("I cannot summarize this")] {
        let source = MockSource::new();
        let records = serve_docs(&source, 5, Duration::from_millis(5));
        let config = PipelineConfig {
            enrichment_enabled: true,
            ..config(2)
        };
        let enricher = LlmEnricher::new(provider, EnrichmentConfig::default());
        let job = job(&source, &config).with_enricher(Arc::new(enricher));

        let result = Pipeline::new(config, job).unwrap().run(records).await.unwrap();

        assert_eq!(successes(&result.outcomes), 5);
        assert!(result.outcomes.iter().all(|d| d.outcome.enrichment().is_none()));
        assert!(result.failures.is_empty());
    }
}

#[tokio::test]
async fn test_enrichment_enabled() {
    let source = MockSource::new();
    let records = serve_docs(&source, 4, Duration::from_millis(5));
    let provider = MockProvider::new(r#"{"summary": "Routine business.", "topics": ["budget"]}"#);
    let config = PipelineConfig {
        enrichment_enabled: true,
        ..config(2)
    };
    let job = job(&source, &config)
        .with_enricher(Arc::new(LlmEnricher::new(provider, EnrichmentConfig::default())));

    let result = Pipeline::new(config, job).unwrap().run(records).await.unwrap();

    assert_eq!(result.metrics.enriched, 4);
    let enrichment = result.outcomes[2].outcome.enrichment().unwrap();
    assert_eq!(enrichment.summary, "Routine business.");
    assert_eq!(enrichment.model.as_deref(), Some("mock"));
}

#[tokio::test]
async fn test_extraction_only_mode_skips_enrichment() {
    let source = MockSource::new();
    let records = serve_docs(&source, 3, Duration::from_millis(5));
    let provider = Arc::new(MockProvider::new(r#"{"summary": "x"}"#));
    let enricher = LlmEnricher::from_shared(Arc::clone(&provider), EnrichmentConfig::default());
    let config = config(2);
    let job = job(&source, &config).with_enricher(Arc::new(enricher));

    let result = Pipeline::new(config, job).unwrap().run(records).await.unwrap();

    assert_eq!(successes(&result.outcomes), 3);
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_graceful_cancel_after_four_completions() {
    let source = MockSource::new();
    let records = serve_docs(&source, 10, Duration::from_millis(10));
    let config = config(2);
    let observed = Observed::new(job(&source, &config)).cancel_after(4, CancelMode::Graceful);
    let pipeline = Pipeline::new(config, observed).unwrap();
    let cancel = CancelHandle::new();
    pipeline.processor().cancel.set(cancel.clone()).unwrap();

    let result = pipeline.run_with_cancel(records, cancel).await.unwrap();

    assert_eq!(result.outcomes.len(), 10);
    // Jobs in flight at cancel time finish normally; nothing new is admitted
    let succeeded = successes(&result.outcomes);
    assert!((4..=6).contains(&succeeded), "succeeded: {}", succeeded);
    for done in &result.outcomes[..succeeded] {
        assert!(done.outcome.is_success());
    }
    for done in &result.outcomes[succeeded..] {
        assert_eq!(done.outcome.failure_reason(), Some(&FailureReason::Cancelled));
        assert_eq!(done.attempts, 0);
    }
    assert_eq!(
        result.metrics.failed.get(&FailureStage::Cancelled),
        Some(&(10 - succeeded))
    );
}

#[tokio::test]
async fn test_hard_cancel_after_four_completions() {
    let source = MockSource::new();
    let records = serve_docs(&source, 10, Duration::from_millis(10));
    // Odd records are slow so one job is always mid-fetch when the fourth completes
    for i in (1..10).step_by(2) {
        source.latency(&doc(i), Duration::from_millis(200));
    }
    let config = config(2);
    let observed = Observed::new(job(&source, &config)).cancel_after(4, CancelMode::Hard);
    let pipeline = Pipeline::new(config, observed).unwrap();
    let cancel = CancelHandle::new();
    pipeline.processor().cancel.set(cancel.clone()).unwrap();

    let result = pipeline.run_with_cancel(records, cancel).await.unwrap();

    assert_eq!(result.outcomes.len(), 10);
    assert_eq!(successes(&result.outcomes), 4);
    assert_eq!(result.failures.len(), 6);
    assert!(result
        .failures
        .iter()
        .all(|f| f.reason == FailureReason::Cancelled));
}

#[tokio::test]
async fn test_hard_cancel_resolves_everything() {
    let source = MockSource::new();
    let records = serve_docs(&source, 10, Duration::from_secs(10));
    let pipeline = pipeline(&source, config(2));
    let cancel = CancelHandle::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.hard();
    });
    let result = tokio::time::timeout(Duration::from_secs(3), pipeline.run_with_cancel(records, cancel))
        .await
        .expect("hard cancel must not hang")
        .unwrap();

    assert_eq!(result.outcomes.len(), 10);
    assert_eq!(result.failures.len(), 10);
    assert!(result
        .failures
        .iter()
        .all(|f| f.reason == FailureReason::Cancelled));
    assert_eq!(source.total_calls(), 2);
}

#[tokio::test]
async fn test_streaming_events_are_ordered_and_terminated() {
    let source = MockSource::new();
    let mut records = serve_docs(&source, 6, Duration::from_millis(5));
    source.latency(&doc(0), Duration::from_millis(60));
    records.push(Record::new(6, None));

    let mut events = pipeline(&source, config(3)).stream(records).unwrap();
    let mut positions = Vec::new();
    let mut terminal = None;
    while let Some(event) = events.recv().await {
        assert!(terminal.is_none(), "no events after complete");
        match event {
            PipelineEvent::Record(done) => positions.push(done.position()),
            PipelineEvent::Complete { total, failed } => terminal = Some((total, failed)),
            PipelineEvent::Error { message } => panic!("unexpected error event: {}", message),
        }
    }

    assert_eq!(positions, (0..7).collect::<Vec<_>>());
    assert_eq!(terminal, Some((7, 1)));
}

#[tokio::test]
async fn test_dropping_stream_receiver_cancels_batch() {
    let source = MockSource::new();
    let records = serve_docs(&source, 10, Duration::from_millis(20));
    let pipeline = pipeline(&source, config(1));

    let cancel = CancelHandle::new();

    let mut events = pipeline.stream_with_cancel(records, cancel.clone()).unwrap();
    assert!(matches!(events.recv().await, Some(PipelineEvent::Record(_))));
    drop(events);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(cancel.mode(), Some(CancelMode::Hard));
    assert!(source.total_calls() < 10);
}

#[tokio::test]
async fn test_dropped_stream_does_not_cancel_later_batches() {
    let source = MockSource::new();
    let records = serve_docs(&source, 10, Duration::from_millis(20));
    let pipeline = pipeline(&source, config(2));

    let mut events = pipeline.stream(records.clone()).unwrap();
    assert!(matches!(events.recv().await, Some(PipelineEvent::Record(_))));
    drop(events);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let result = pipeline.run(records).await.unwrap();
    assert_eq!(successes(&result.outcomes), 10);
    assert_eq!(result.metrics.failed.get(&FailureStage::Cancelled), None);
}

#[tokio::test]
async fn test_stream_serializes_as_ndjson_events() {
    let source = MockSource::new();
    let records = serve_docs(&source, 2, Duration::from_millis(1));
    let mut events = pipeline(&source, config(2)).stream(records).unwrap();

    let mut lines = Vec::new();
    while let Some(event) = events.recv().await {
        lines.push(serde_json::to_value(&event).unwrap());
    }

    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0]["event"], "record");
    assert_eq!(lines[0]["outcome"]["status"], "success");
    assert_eq!(lines[2]["event"], "complete");
    assert_eq!(lines[2]["total"], 2);
}

fn sleepy_records(delays: &[u64]) -> Vec<Record> {
    delays
        .iter()
        .enumerate()
        .map(|(i, delay)| Record::new(i, Some(format!("ref-{}", i))).with_metadata("delay_ms", *delay))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_stream_is_complete_and_monotonic(
        delays in proptest::collection::vec(0u64..15, 0..24),
        concurrency in 1usize..6,
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let (positions, terminal) = runtime.block_on(async {
            let pipeline = Pipeline::new(
                PipelineConfig { concurrency, ..PipelineConfig::default() },
                Sleepy,
            )
            .unwrap();
            let mut events = pipeline.stream(sleepy_records(&delays)).unwrap();
            let mut positions = Vec::new();
            let mut terminal = None;
            while let Some(event) = events.recv().await {
                match event {
                    PipelineEvent::Record(done) => positions.push(done.position()),
                    PipelineEvent::Complete { total, .. } => terminal = Some(total),
                    PipelineEvent::Error { .. } => {}
                }
            }
            (positions, terminal)
        });

        prop_assert_eq!(positions, (0..delays.len()).collect::<Vec<_>>());
        prop_assert_eq!(terminal, Some(delays.len()));
    }

    #[test]
    fn prop_batch_has_one_outcome_per_record(
        delays in proptest::collection::vec(0u64..10, 0..24),
        concurrency in 1usize..6,
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let result = runtime.block_on(async {
            Pipeline::new(PipelineConfig { concurrency, ..PipelineConfig::default() }, Sleepy)
                .unwrap()
                .run(sleepy_records(&delays))
                .await
                .unwrap()
        });

        prop_assert_eq!(result.outcomes.len(), delays.len());
        for (position, done) in result.outcomes.iter().enumerate() {
            prop_assert_eq!(done.position(), position);
            let expected = position.to_string();
            prop_assert_eq!(done.outcome.text(), Some(expected.as_str()));
        }
    }
}
