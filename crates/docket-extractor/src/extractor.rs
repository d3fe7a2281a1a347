//! Core Extractor implementation

use crate::cache::{CacheStats, DocumentCache};
use crate::config::ExtractorConfig;
use crate::error::ExtractError;
use crate::resolver::LinkResolver;
use docket_domain::traits::{DocumentParser, DocumentSource};
use docket_domain::{FetchedDocument, Record};
use std::sync::Arc;
use tracing::{debug, warn};

/// The Extractor turns one record into the plain text of its minutes
///
/// Steps, in order:
/// 1. validate the record's document reference
/// 2. resolve a landing page to its document link (cached per reference)
/// 3. download and parse the document (cached per document URL)
///
/// Errors are returned unchanged and nothing is retried here; retry policy
/// belongs to the scheduler.
pub struct Extractor<S, P>
where
    S: DocumentSource,
    P: DocumentParser,
{
    source: Arc<S>,
    parser: Arc<P>,
    resolver: LinkResolver,
    links: DocumentCache<String>,
    texts: DocumentCache<Arc<str>>,
}

impl<S, P> Extractor<S, P>
where
    S: DocumentSource + 'static,
    P: DocumentParser + 'static,
{
    /// Create a new Extractor with caching enabled
    pub fn new(source: S, parser: P, config: &ExtractorConfig) -> Self {
        Self {
            source: Arc::new(source),
            parser: Arc::new(parser),
            resolver: LinkResolver::new(config),
            links: DocumentCache::new("links"),
            texts: DocumentCache::new("texts"),
        }
    }

    /// Turn the document caches on or off
    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        if enabled != self.texts.is_enabled() {
            self.links = if enabled {
                DocumentCache::new("links")
            } else {
                DocumentCache::disabled("links")
            };
            self.texts = if enabled {
                DocumentCache::new("texts")
            } else {
                DocumentCache::disabled("texts")
            };
        }
        self
    }

    /// Extract the text for a record
    ///
    /// # Errors
    ///
    /// - `MissingReference` if the record has no usable reference (no network call)
    /// - `Fetch` for HTTP/transport failures
    /// - `Link` for landing pages without a usable minutes link
    /// - `Parse` if the document holds no readable text
    pub async fn extract(&self, record: &Record) -> Result<Arc<str>, ExtractError> {
        let reference = record.reference().ok_or(ExtractError::MissingReference)?;

        let document_url = self.resolve(reference).await?;
        debug!(record = %record.id, %document_url, "resolved");

        self.texts
            .get_or_fetch(&document_url, || self.download(&document_url))
            .await
    }

    /// Resolve a reference to the URL of the document itself
    pub async fn resolve(&self, reference: &str) -> Result<String, ExtractError> {
        if self.resolver.is_direct(reference) {
            return Ok(reference.to_string());
        }

        self.links
            .get_or_fetch(reference, || async {
                let page = self.fetch(reference).await?;
                if !page.is_success() {
                    let message = if page.status == 404 {
                        "Page not found"
                    } else {
                        "landing page request failed"
                    };
                    return Err(ExtractError::http(page.status, message));
                }
                self.resolver.find_document_link(&page.url, &page.body_text())
            })
            .await
    }

    /// Combined counters of the link and text caches
    pub fn cache_stats(&self) -> CacheStats {
        self.links.stats().merge(self.texts.stats())
    }

    /// Counters of the text cache only
    pub fn text_cache_stats(&self) -> CacheStats {
        self.texts.stats()
    }

    async fn fetch(&self, url: &str) -> Result<FetchedDocument, ExtractError> {
        self.source.get(url).await.map_err(|e| {
            warn!(url, error = %e, "request failed");
            ExtractError::transport(e.to_string())
        })
    }

    async fn download(&self, url: &str) -> Result<Arc<str>, ExtractError> {
        let document = self.fetch(url).await?;
        if !document.is_success() {
            return Err(ExtractError::http(document.status, "document download failed"));
        }

        // Parsing is CPU-bound
        let parser = Arc::clone(&self.parser);
        let text = tokio::task::spawn_blocking(move || {
            parser
                .parse(&document)
                .map_err(|e| ExtractError::Parse(e.to_string()))
        })
        .await
        .map_err(|e| ExtractError::Parse(format!("document parser crashed: {}", e)))??;

        debug!(url, chars = text.len(), "parsed");
        Ok(Arc::from(text))
    }
}
