//! Client for the council meetings API.

use crate::config::SourceConfig;
use crate::error::{CliError, Result};
use docket_domain::Record;
use serde_json::Value;
use tracing::{debug, info};

/// Envelope keys the meeting list may be wrapped in, checked in order.
const ENVELOPE_KEYS: [&str; 4] = ["data", "items", "results", "meetings"];

/// Fetches the meeting list and turns it into records.
#[derive(Debug, Clone)]
pub struct MeetingsClient {
    client: reqwest::Client,
    config: SourceConfig,
}

impl MeetingsClient {
    /// Build a client with the configured timeout.
    pub fn new(config: SourceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(format!("docket/{}", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, config })
    }

    /// Fetch all meetings of `meeting_type` (the configured type if `None`).
    ///
    /// The endpoint returns every meeting in one response.
    pub async fn fetch(&self, meeting_type: Option<&str>, api_key: Option<&str>) -> Result<Vec<Record>> {
        let meeting_type = meeting_type.unwrap_or(&self.config.meeting_type);
        let mut request = self
            .client
            .get(&self.config.api_url)
            .query(&[("type", meeting_type)]);
        if let Some(key) = api_key.or(self.config.api_key.as_deref()) {
            request = request.header(self.config.api_key_header.as_str(), key);
        }

        info!(url = %self.config.api_url, meeting_type, "fetching meeting list");
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(CliError::Source(format!("status {}: {}", status.as_u16(), snippet)));
        }

        let body: Value = response.json().await?;
        let records = parse_meetings(&body, &self.config.site_base)?;
        info!(count = records.len(), "meeting list fetched");
        Ok(records)
    }
}

/// Turn an API response into records.
///
/// The list may be the body itself or wrapped under one of the envelope
/// keys. Ids are list indexes; a missing `relatedURL` leaves the meeting
/// without a reference.
pub fn parse_meetings(body: &Value, site_base: &str) -> Result<Vec<Record>> {
    let meetings = match body {
        Value::Array(items) => items,
        Value::Object(map) => ENVELOPE_KEYS
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array))
            .ok_or_else(|| {
                let keys: Vec<&str> = map.keys().map(String::as_str).collect();
                CliError::Source(format!("no meeting list in response (keys: {})", keys.join(", ")))
            })?,
        other => {
            return Err(CliError::Source(format!(
                "unexpected response type: {}",
                json_kind(other)
            )))
        }
    };

    let records = meetings
        .iter()
        .enumerate()
        .map(|(idx, meeting)| {
            let field = |name: &str| meeting.get(name).and_then(Value::as_str).unwrap_or_default();
            let url = meeting_url(site_base, field("relatedURL"));
            debug!(idx, url = %url, "meeting");
            Record::new(idx, Some(url))
                .with_metadata("meetingType", field("eventTitle"))
                .with_metadata("status", field("locationStatus"))
                .with_metadata("eventDate", field("eventDateStart"))
        })
        .collect();
    Ok(records)
}

/// Absolute meeting URL for a site-relative link.
fn meeting_url(site_base: &str, related: &str) -> String {
    let related = related.trim();
    if related.is_empty() {
        return String::new();
    }
    if related.starts_with("http://") || related.starts_with("https://") {
        return related.to_string();
    }
    let base = site_base.trim_end_matches('/');
    if related.starts_with('/') {
        format!("{}{}", base, related)
    } else {
        format!("{}/{}", base, related)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
