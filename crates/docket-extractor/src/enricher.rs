//! LLM-backed enrichment adapter

use crate::chunking::TextChunker;
use crate::config::EnrichmentConfig;
use crate::prompt::PromptBuilder;
use crate::response::parse_enrichment_response;
use async_trait::async_trait;
use docket_domain::traits::{EnrichmentAdapter, LlmProvider};
use docket_domain::{AdapterError, Enrichment, EnrichmentRequest};
use std::sync::Arc;
use tokio::time::timeout;
use tracing::debug;

/// Summarizes meeting text with an [`LlmProvider`]
pub struct LlmEnricher<L>
where
    L: LlmProvider,
{
    llm_provider: Arc<L>,
    config: EnrichmentConfig,
}

impl<L> LlmEnricher<L>
where
    L: LlmProvider + 'static,
{
    /// Create a new enricher
    pub fn new(llm_provider: L, config: EnrichmentConfig) -> Self {
        Self {
            llm_provider: Arc::new(llm_provider),
            config,
        }
    }

    /// Create an enricher around a shared provider
    pub fn from_shared(llm_provider: Arc<L>, config: EnrichmentConfig) -> Self {
        Self {
            llm_provider,
            config,
        }
    }

    /// Build the prompt for a request, trimming the text to the prompt budget
    pub fn build_prompt(&self, request: &EnrichmentRequest) -> String {
        let text = if request.text.len() > self.config.max_prompt_chars {
            let chunker = TextChunker::new(self.config.chunk_strategy, self.config.max_prompt_chars);
            let first = chunker.first_chunk(&request.text);
            debug!(
                record = %request.record_id,
                original = request.text.len(),
                kept = first.len(),
                "text trimmed to prompt budget"
            );
            first
        } else {
            request.text.to_string()
        };

        PromptBuilder::new(&text, request.detail)
            .with_prior_summaries(&request.prior_summaries)
            .build()
    }
}

#[async_trait]
impl<L> EnrichmentAdapter for LlmEnricher<L>
where
    L: LlmProvider + 'static,
{
    async fn enrich(&self, request: &EnrichmentRequest) -> Result<Enrichment, AdapterError> {
        let prompt = self.build_prompt(request);
        debug!(record = %request.record_id, prompt_chars = prompt.len(), "enriching");

        let response = timeout(
            self.config.enrichment_timeout(),
            self.llm_provider.generate(&prompt),
        )
        .await
        .map_err(|_| AdapterError::Timeout)?
        .map_err(|e| AdapterError::Service(e.to_string()))?;

        let mut enrichment = parse_enrichment_response(&response)?;
        enrichment.model = Some(self.llm_provider.model_name().to_string());
        Ok(enrichment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docket_domain::{DetailLevel, PriorSummary, RecordId};
    use docket_llm::MockProvider;
    use std::time::Duration;

    const VALID: &str = r#"{"summary": "Budget approved.", "topics": ["budget"], "decisions": ["Budget approved"]}"#;

    fn request(text: &str) -> EnrichmentRequest {
        EnrichmentRequest::new(RecordId::from(7), Arc::from(text))
    }

    #[tokio::test]
    async fn test_enrich_success_records_model() {
        let enricher = LlmEnricher::new(MockProvider::new(VALID), EnrichmentConfig::default());
        let enrichment = enricher.enrich(&request("minutes")).await.unwrap();

        assert_eq!(enrichment.summary, "Budget approved.");
        assert_eq!(enrichment.decisions, vec!["Budget approved"]);
        assert_eq!(enrichment.model.as_deref(), Some("mock"));
    }

    #[tokio::test]
    async fn test_malformed_response_is_invalid() {
        let enricher = LlmEnricher::new(MockProvider::new("I cannot help"), EnrichmentConfig::default());
        let result = enricher.enrich(&request("minutes")).await;
        assert!(matches!(result, Err(AdapterError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_provider_failure_is_service_error() {
        let enricher = LlmEnricher::new(MockProvider::failing(), EnrichmentConfig::default());
        let result = enricher.enrich(&request("minutes")).await;
        assert!(matches!(result, Err(AdapterError::Service(_))));
    }

    #[tokio::test]
    async fn test_slow_provider_times_out() {
        let provider = MockProvider::new(VALID).with_latency(Duration::from_secs(5));
        let config = EnrichmentConfig {
            enrichment_timeout_secs: 1,
            ..EnrichmentConfig::default()
        };
        let enricher = LlmEnricher::new(provider, config);

        let result = enricher.enrich(&request("minutes")).await;
        assert_eq!(result, Err(AdapterError::Timeout));
    }

    #[test]
    fn test_prompt_respects_budget_and_context() {
        let config = EnrichmentConfig {
            max_prompt_chars: 40,
            ..EnrichmentConfig::default()
        };
        let enricher = LlmEnricher::new(MockProvider::default(), config);

        let text = "CALL TO ORDER\n\nA very long discussion of the capital plan followed.\n\nADJOURNED";
        let request = request(text)
            .with_detail(DetailLevel::Brief)
            .with_prior_summaries(vec![PriorSummary {
                record_id: RecordId::from(6),
                summary: "Previous meeting".to_string(),
            }]);

        let prompt = enricher.build_prompt(&request);
        assert!(prompt.contains("CALL TO ORDER"));
        assert!(!prompt.contains("ADJOURNED"));
        assert!(prompt.contains("- [6] Previous meeting"));
        assert!(prompt.contains("Level of detail: brief"));
    }
}
