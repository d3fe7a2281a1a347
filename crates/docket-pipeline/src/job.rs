//! Extraction job: extract, then optionally enrich

use crate::config::PipelineConfig;
use crate::scheduler::RecordProcessor;
use async_trait::async_trait;
use docket_domain::traits::{DocumentParser, DocumentSource, EnrichmentAdapter};
use docket_domain::{
    BatchId, DetailLevel, Enrichment, EnrichmentRequest, Outcome, PriorSummary, Record,
};
use docket_extractor::{CacheStats, Extractor};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

/// The [`RecordProcessor`] used for council meeting batches
///
/// Text comes from the [`Extractor`]. When enrichment is enabled and an
/// adapter is attached, the text is then enriched; an enrichment failure
/// leaves the record a success without enrichment.
pub struct ExtractionJob<S, P>
where
    S: DocumentSource,
    P: DocumentParser,
{
    extractor: Extractor<S, P>,
    enricher: Option<Arc<dyn EnrichmentAdapter>>,
    enrichment_enabled: bool,
    detail: DetailLevel,
    context_limit: usize,
    summaries: Mutex<BTreeMap<usize, PriorSummary>>,
}

impl<S, P> ExtractionJob<S, P>
where
    S: DocumentSource + 'static,
    P: DocumentParser + 'static,
{
    /// Create a job around an extractor
    ///
    /// The extractor's caches follow `config.cache_enabled`.
    pub fn new(extractor: Extractor<S, P>, config: &PipelineConfig) -> Self {
        Self {
            extractor: extractor.with_cache_enabled(config.cache_enabled),
            enricher: None,
            enrichment_enabled: config.enrichment_enabled,
            detail: config.detail,
            context_limit: config.context_limit,
            summaries: Mutex::new(BTreeMap::new()),
        }
    }

    /// Attach an enrichment adapter
    pub fn with_enricher(mut self, enricher: Arc<dyn EnrichmentAdapter>) -> Self {
        self.enricher = Some(enricher);
        self
    }

    /// Whether records will be enriched
    pub fn enriches(&self) -> bool {
        self.enrichment_enabled && self.enricher.is_some()
    }

    /// The underlying extractor
    pub fn extractor(&self) -> &Extractor<S, P> {
        &self.extractor
    }

    /// Summaries of completed records before `position`, most recent last
    fn prior_summaries(&self, position: usize) -> Vec<PriorSummary> {
        if self.context_limit == 0 {
            return Vec::new();
        }
        let summaries = self.summaries.lock().unwrap_or_else(PoisonError::into_inner);
        let mut prior: Vec<PriorSummary> = summaries
            .range(..position)
            .rev()
            .take(self.context_limit)
            .map(|(_, summary)| summary.clone())
            .collect();
        prior.reverse();
        prior
    }

    async fn enrich(
        &self,
        enricher: &dyn EnrichmentAdapter,
        record: &Record,
        text: Arc<str>,
    ) -> Option<Enrichment> {
        let request = EnrichmentRequest::new(record.id.clone(), text)
            .with_prior_summaries(self.prior_summaries(record.position))
            .with_detail(self.detail);

        match enricher.enrich(&request).await {
            Ok(enrichment) => {
                self.summaries
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(
                        record.position,
                        PriorSummary {
                            record_id: record.id.clone(),
                            summary: enrichment.summary.clone(),
                        },
                    );
                Some(enrichment)
            }
            Err(e) => {
                warn!(
                    position = record.position,
                    record = %record.id,
                    error = %e,
                    "enrichment failed, keeping text only"
                );
                None
            }
        }
    }
}

#[async_trait]
impl<S, P> RecordProcessor for ExtractionJob<S, P>
where
    S: DocumentSource + 'static,
    P: DocumentParser + 'static,
{
    async fn process(&self, record: &Record) -> Outcome {
        let text = match self.extractor.extract(record).await {
            Ok(text) => text,
            Err(e) => {
                warn!(
                    position = record.position,
                    record = %record.id,
                    error = %e,
                    "extraction failed"
                );
                return Outcome::failure(e.into());
            }
        };
        debug!(position = record.position, chars = text.len(), "extracted");

        let enrichment = match &self.enricher {
            Some(enricher) if self.enrichment_enabled => {
                self.enrich(enricher.as_ref(), record, Arc::clone(&text)).await
            }
            _ => None,
        };

        Outcome::Success { text, enrichment }
    }

    fn start_batch(&self, _batch_id: &BatchId) {
        self.summaries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn cache_stats(&self) -> Option<CacheStats> {
        Some(self.extractor.cache_stats())
    }
}
