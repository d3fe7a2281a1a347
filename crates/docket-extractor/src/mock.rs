//! In-memory document source for deterministic testing
//!
//! Routes are registered per URL. Unknown URLs answer `404`. Every request
//! is counted, which is how tests check that a shared document was fetched
//! exactly once.

use async_trait::async_trait;
use docket_domain::traits::DocumentSource;
use docket_domain::FetchedDocument;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;

/// Transport failure injected by a [`MockSource`] route
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct MockTransportError(pub String);

#[derive(Debug, Clone)]
enum MockReply {
    Document {
        status: u16,
        content_type: Option<String>,
        body: Vec<u8>,
    },
    Transport(String),
}

#[derive(Debug, Clone)]
struct MockRoute {
    reply: MockReply,
    latency: Option<Duration>,
}

#[derive(Debug, Default)]
struct MockState {
    routes: HashMap<String, MockRoute>,
    calls: HashMap<String, usize>,
}

/// Scripted [`DocumentSource`]
///
/// Cloning shares routes and counters.
///
/// # Examples
///
/// ```
/// use docket_extractor::MockSource;
/// use docket_domain::traits::DocumentSource;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let source = MockSource::new();
/// source.text("https://council.example/m.txt", "Minutes");
///
/// let doc = source.get("https://council.example/m.txt").await.unwrap();
/// assert_eq!(doc.status, 200);
/// assert_eq!(source.calls("https://council.example/m.txt"), 1);
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockSource {
    state: Arc<Mutex<MockState>>,
}

impl MockSource {
    /// Create a source with no routes
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve an HTML landing page
    pub fn page(&self, url: &str, html: &str) -> &Self {
        self.respond(url, 200, Some("text/html; charset=utf-8"), html.as_bytes().to_vec())
    }

    /// Serve a plain-text document
    pub fn text(&self, url: &str, text: &str) -> &Self {
        self.respond(url, 200, Some("text/plain; charset=utf-8"), text.as_bytes().to_vec())
    }

    /// Serve a PDF document
    pub fn pdf(&self, url: &str, bytes: Vec<u8>) -> &Self {
        self.respond(url, 200, Some("application/pdf"), bytes)
    }

    /// Answer with a bare status code
    pub fn status(&self, url: &str, status: u16) -> &Self {
        self.respond(url, status, Some("text/html"), Vec::new())
    }

    /// Serve an arbitrary response
    pub fn respond(&self, url: &str, status: u16, content_type: Option<&str>, body: Vec<u8>) -> &Self {
        self.insert(
            url,
            MockReply::Document {
                status,
                content_type: content_type.map(str::to_string),
                body,
            },
        )
    }

    /// Fail requests to `url` without a response
    pub fn transport_error(&self, url: &str, message: &str) -> &Self {
        self.insert(url, MockReply::Transport(message.to_string()))
    }

    /// Delay every response for `url`
    pub fn latency(&self, url: &str, latency: Duration) -> &Self {
        if let Some(route) = self.lock().routes.get_mut(url) {
            route.latency = Some(latency);
        }
        self
    }

    /// Number of requests made for `url`
    pub fn calls(&self, url: &str) -> usize {
        self.lock().calls.get(url).copied().unwrap_or(0)
    }

    /// Number of requests made for any URL
    pub fn total_calls(&self) -> usize {
        self.lock().calls.values().sum()
    }

    fn insert(&self, url: &str, reply: MockReply) -> &Self {
        let mut state = self.lock();
        let latency = state.routes.get(url).and_then(|route| route.latency);
        state.routes.insert(url.to_string(), MockRoute { reply, latency });
        drop(state);
        self
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl DocumentSource for MockSource {
    type Error = MockTransportError;

    async fn get(&self, url: &str) -> Result<FetchedDocument, Self::Error> {
        let route = {
            let mut state = self.lock();
            *state.calls.entry(url.to_string()).or_insert(0) += 1;
            state.routes.get(url).cloned()
        };

        let Some(route) = route else {
            return Ok(FetchedDocument {
                url: url.to_string(),
                status: 404,
                content_type: Some("text/html".to_string()),
                body: b"Not Found".to_vec(),
            });
        };

        if let Some(latency) = route.latency {
            tokio::time::sleep(latency).await;
        }

        match route.reply {
            MockReply::Document {
                status,
                content_type,
                body,
            } => Ok(FetchedDocument {
                url: url.to_string(),
                status,
                content_type,
                body,
            }),
            MockReply::Transport(message) => Err(MockTransportError(message)),
        }
    }
}
