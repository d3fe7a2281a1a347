//! Landing page to document link resolution
//!
//! A meeting reference is either a direct document link (its path ends in a
//! document suffix such as `.pdf`) or a landing page that links to the
//! minutes. For landing pages the first anchor whose visible text contains
//! the configured phrase wins.

use crate::config::ExtractorConfig;
use crate::error::ExtractError;
use regex::Regex;
use reqwest::Url;
use std::sync::LazyLock;

static ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\b[^>]*?\bhref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))[^>]*>(.*?)</a\s*>"#)
        .unwrap()
});
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());
static SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Resolves meeting references to document URLs
#[derive(Debug, Clone)]
pub struct LinkResolver {
    link_text: String,
    document_suffixes: Vec<String>,
}

impl LinkResolver {
    /// Create a resolver from the extractor configuration
    pub fn new(config: &ExtractorConfig) -> Self {
        Self {
            link_text: normalize(&config.link_text),
            document_suffixes: config
                .document_suffixes
                .iter()
                .map(|s| s.trim().to_lowercase())
                .collect(),
        }
    }

    /// Whether the reference already points at a document
    pub fn is_direct(&self, reference: &str) -> bool {
        let path = match Url::parse(reference) {
            Ok(url) => url.path().to_lowercase(),
            Err(_) => reference
                .split(['?', '#'])
                .next()
                .unwrap_or_default()
                .to_lowercase(),
        };
        self.document_suffixes
            .iter()
            .any(|suffix| path.ends_with(suffix.as_str()))
    }

    /// Find the minutes link in a landing page and make it absolute
    ///
    /// # Errors
    ///
    /// - `Link` if no anchor carries the link text
    /// - `Link` if the page URL or the href is not a valid URL
    pub fn find_document_link(&self, page_url: &str, html: &str) -> Result<String, ExtractError> {
        let href = ANCHOR_RE
            .captures_iter(html)
            .find(|caps| {
                caps.get(4)
                    .map(|text| visible_text(text.as_str()).contains(&self.link_text))
                    .unwrap_or(false)
            })
            .and_then(|caps| caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)))
            .map(|m| decode_entities(m.as_str().trim()))
            .filter(|href| !href.is_empty())
            .ok_or_else(|| {
                ExtractError::Link(format!("no '{}' link found", self.link_text))
            })?;

        join_url(page_url, &href)
    }
}

/// Resolve `href` against the page it appeared on
///
/// Handles absolute, root-relative and relative links.
pub fn join_url(page_url: &str, href: &str) -> Result<String, ExtractError> {
    let base = Url::parse(page_url)
        .map_err(|e| ExtractError::Link(format!("invalid page URL '{}': {}", page_url, e)))?;
    base.join(href)
        .map(String::from)
        .map_err(|e| ExtractError::Link(format!("invalid link '{}': {}", href, e)))
}

fn visible_text(inner_html: &str) -> String {
    let text = TAG_RE.replace_all(inner_html, " ");
    normalize(&decode_entities(&text))
}

fn normalize(text: &str) -> String {
    SPACE_RE.replace_all(text.trim(), " ").to_lowercase()
}

pub(crate) fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&#160;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
