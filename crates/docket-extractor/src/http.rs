//! HTTP document source backed by reqwest

use crate::config::ExtractorConfig;
use crate::error::ExtractError;
use async_trait::async_trait;
use docket_domain::traits::DocumentSource;
use docket_domain::FetchedDocument;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

/// Fetches landing pages and documents over HTTP(S)
///
/// Redirects are followed; the final URL is reported so relative links on a
/// redirected landing page resolve against the right base.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    /// Build a source with the configured timeout and user agent
    pub fn new(config: &ExtractorConfig) -> Result<Self, ExtractError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ExtractError::Internal(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Wrap an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DocumentSource for HttpSource {
    type Error = reqwest::Error;

    async fn get(&self, url: &str) -> Result<FetchedDocument, Self::Error> {
        let response = self.client.get(url).send().await?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?.to_vec();

        debug!(url, status, bytes = body.len(), "fetched");

        Ok(FetchedDocument {
            url: final_url,
            status,
            content_type,
            body,
        })
    }
}
