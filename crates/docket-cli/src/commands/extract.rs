//! Extract command implementation.

use crate::cli::ExtractArgs;
use crate::config::Config;
use crate::error::Result;
use crate::output::Formatter;
use crate::records::{load_records, save_json, DateRange, ExtractedMeeting};
use crate::source::MeetingsClient;
use docket_domain::{FailureEntry, Record, RecordOutcome};
use docket_extractor::{Extractor, HttpSource, LlmEnricher, PdfTextParser};
use docket_llm::OllamaProvider;
use docket_pipeline::{
    CancelHandle, ExtractionJob, FailureLedger, Pipeline, PipelineEvent, PipelineMetrics,
    RecordProcessor,
};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Apply command-line flags on top of the loaded configuration.
pub fn apply_overrides(args: &ExtractArgs, config: &mut Config) {
    if let Some(workers) = args.workers {
        config.pipeline.concurrency = workers;
    }
    if let Some(timeout) = args.timeout {
        config.pipeline.job_timeout_secs = timeout;
    }
    if args.no_cache {
        config.pipeline.cache_enabled = false;
    }
    if args.enrich {
        config.pipeline.enrichment_enabled = true;
    }
    if let Some(detail) = args.detail {
        config.pipeline.detail = detail;
    }
    if let Some(model) = &args.model {
        config.ollama.model = model.clone();
    }
    if let Some(url) = &args.ollama_url {
        config.ollama.endpoint = url.clone();
    }
}

/// Execute the extract command.
pub async fn execute_extract(args: ExtractArgs, config: &Config, formatter: &Formatter) -> Result<()> {
    let mut config = config.clone();
    apply_overrides(&args, &mut config);
    config.validate()?;

    // Bad dates fail before any network work
    let range = DateRange::parse(args.start_date.as_deref(), args.end_date.as_deref())?;

    let records = if args.fetch {
        let client = MeetingsClient::new(config.source.clone())?;
        let records = client.fetch(None, args.api_key.as_deref()).await?;
        save_json(&args.input, &records)?;
        eprintln!(
            "{}",
            formatter.info(&format!("Saved {} meetings to {}", records.len(), args.input.display()))
        );
        records
    } else {
        load_records(&args.input)?
    };

    let loaded = records.len();
    let records = range.filter(records);
    if !range.is_unbounded() {
        info!(loaded, kept = records.len(), "filtered by date");
    }

    let pipeline = Pipeline::new(config.pipeline.clone(), build_job(&config)?)?;
    let cancel = CancelHandle::new();
    install_interrupt_handler(cancel.clone());

    let paths = OutputPaths {
        output: &args.output,
        failed: &args.failed,
    };
    if args.stream {
        let stdout = std::io::stdout();
        run_stream(&pipeline, records, cancel, &paths, formatter, &mut stdout.lock()).await
    } else {
        run_batch(&pipeline, records, cancel, &paths, formatter).await
    }
}

fn build_job(config: &Config) -> Result<ExtractionJob<HttpSource, PdfTextParser>> {
    let source = HttpSource::new(&config.extractor)?;
    let extractor = Extractor::new(source, PdfTextParser::new(), &config.extractor);
    let mut job = ExtractionJob::new(extractor, &config.pipeline);

    if config.pipeline.enrichment_enabled {
        let provider = OllamaProvider::with_timeout(
            config.ollama.endpoint.clone(),
            config.ollama.model.clone(),
            config.ollama.timeout(),
        )
        .with_max_retries(config.ollama.max_retries)
        .with_json_mode(true);
        info!(endpoint = %config.ollama.endpoint, model = %config.ollama.model, "enrichment enabled");
        job = job.with_enricher(Arc::new(LlmEnricher::new(provider, config.enrichment.clone())));
    }
    Ok(job)
}

/// First Ctrl+C drains in-flight records, a second abandons them.
fn install_interrupt_handler(cancel: CancelHandle) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("Interrupt received, finishing in-flight records (Ctrl+C again to abort)");
        cancel.graceful();

        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("Second interrupt received, abandoning in-flight records");
        cancel.hard();
    });
}

/// Files a run writes.
pub(crate) struct OutputPaths<'a> {
    pub output: &'a Path,
    pub failed: &'a Path,
}

impl OutputPaths<'_> {
    /// Write ordered results, and the failure ledger when it is non-empty.
    fn write(&self, outcomes: &[RecordOutcome], failures: &[FailureEntry]) -> Result<()> {
        let meetings: Vec<ExtractedMeeting<'_>> = outcomes.iter().map(ExtractedMeeting::from).collect();
        save_json(self.output, &meetings)?;
        if !failures.is_empty() {
            save_json(self.failed, failures)?;
        }
        Ok(())
    }
}

pub(crate) async fn run_batch<P: RecordProcessor>(
    pipeline: &Pipeline<P>,
    records: Vec<Record>,
    cancel: CancelHandle,
    paths: &OutputPaths<'_>,
    formatter: &Formatter,
) -> Result<()> {
    let result = pipeline.run_with_cancel(records, cancel).await?;
    paths.write(&result.outcomes, &result.failures)?;

    println!("{}", formatter.format_result(&result)?);
    report_files(paths, result.outcomes.len(), result.failures.len(), formatter);
    Ok(())
}

/// Print events as NDJSON to `out` while collecting results for the files.
pub(crate) async fn run_stream<P: RecordProcessor, W: Write>(
    pipeline: &Pipeline<P>,
    records: Vec<Record>,
    cancel: CancelHandle,
    paths: &OutputPaths<'_>,
    formatter: &Formatter,
    out: &mut W,
) -> Result<()> {
    let started = Instant::now();
    let mut events = pipeline.stream_with_cancel(records, cancel)?;
    let mut outcomes = Vec::new();
    let mut ledger = FailureLedger::new();
    let mut metrics = PipelineMetrics::new();

    while let Some(event) = events.recv().await {
        writeln!(out, "{}", serde_json::to_string(&event)?)?;
        out.flush()?;
        match event {
            PipelineEvent::Record(done) => {
                ledger.observe(&done);
                metrics.record_outcome(&done);
                outcomes.push(done);
            }
            PipelineEvent::Error { message } => warn!(%message, "stream reported an error"),
            PipelineEvent::Complete { .. } => break,
        }
    }

    if let Some(stats) = pipeline.processor().cache_stats() {
        metrics.record_cache(stats);
    }
    metrics.elapsed_ms = started.elapsed().as_millis() as u64;

    let failures = ledger.export();
    paths.write(&outcomes, &failures)?;

    // stdout carries the events; the summary goes to stderr
    eprintln!("{}", metrics.summary());
    report_files(paths, outcomes.len(), failures.len(), formatter);
    Ok(())
}

fn report_files(paths: &OutputPaths<'_>, written: usize, failed: usize, formatter: &Formatter) {
    eprintln!(
        "{}",
        formatter.success(&format!("Wrote {} records to {}", written, paths.output.display()))
    );
    if failed > 0 {
        eprintln!(
            "{}",
            formatter.warning(&format!("{} failures listed in {}", failed, paths.failed.display()))
        );
    }
}
