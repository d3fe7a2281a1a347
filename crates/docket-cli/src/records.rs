//! Loading, filtering and saving meeting records.

use crate::error::{CliError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use docket_domain::{Enrichment, FailureReason, Outcome, Record, RecordOutcome};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Metadata field holding the meeting's ISO date.
pub const EVENT_DATE_FIELD: &str = "eventDate";

/// Load records from a JSON array.
pub fn load_records(path: &Path) -> Result<Vec<Record>> {
    let contents = fs::read_to_string(path).map_err(|e| {
        CliError::InvalidInput(format!("Cannot read {}: {}", path.display(), e))
    })?;
    let records: Vec<Record> = serde_json::from_str(&contents).map_err(|e| {
        CliError::InvalidInput(format!("Invalid JSON in {}: {}", path.display(), e))
    })?;
    Ok(records)
}

/// Write any serializable value as pretty JSON.
pub fn save_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

/// Inclusive date range used to select meetings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    /// First day included
    pub start: Option<NaiveDate>,
    /// Last day included
    pub end: Option<NaiveDate>,
}

impl DateRange {
    /// Parse `YYYY-MM-DD` bounds; an inverted range is rejected.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self> {
        let range = Self {
            start: start.map(|s| parse_bound("start", s)).transpose()?,
            end: end.map(|s| parse_bound("end", s)).transpose()?,
        };
        if let (Some(start), Some(end)) = (range.start, range.end) {
            if start > end {
                return Err(CliError::InvalidInput(format!(
                    "start date {} is after end date {}",
                    start, end
                )));
            }
        }
        Ok(range)
    }

    /// Whether no bound is set.
    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// Whether a date falls inside the range.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |start| date >= start) && self.end.map_or(true, |end| date <= end)
    }

    /// Keep the records whose event date is inside the range.
    ///
    /// With any bound set, records without a parseable date are dropped.
    pub fn filter(&self, records: Vec<Record>) -> Vec<Record> {
        if self.is_unbounded() {
            return records;
        }
        records
            .into_iter()
            .filter(|record| {
                record
                    .metadata_str(EVENT_DATE_FIELD)
                    .and_then(parse_event_date)
                    .is_some_and(|date| self.contains(date))
            })
            .collect()
    }
}

fn parse_bound(which: &str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        CliError::InvalidInput(format!(
            "invalid {} date '{}' (expected YYYY-MM-DD)",
            which, value
        ))
    })
}

/// Calendar date of an ISO-8601 event timestamp.
///
/// Accepts RFC 3339 (`Z` or an offset), a naive date-time, or a bare date.
/// An offset timestamp keeps its local date.
pub fn parse_event_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt.date());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

/// A record as written to the results file.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedMeeting<'a> {
    /// The input record, fields inline
    #[serde(flatten)]
    pub record: &'a Record,

    /// Whether text was extracted
    pub success: bool,

    /// Extracted minutes text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<&'a str>,

    /// Structured enrichment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrichment: Option<&'a Enrichment>,

    /// Why the record failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<&'a FailureReason>,

    /// Attempts made
    pub attempts: u32,
}

impl<'a> From<&'a RecordOutcome> for ExtractedMeeting<'a> {
    fn from(done: &'a RecordOutcome) -> Self {
        let (text, enrichment, failure) = match &done.outcome {
            Outcome::Success { text, enrichment } => (Some(&**text), enrichment.as_ref(), None),
            Outcome::Failure { reason } => (None, None, Some(reason)),
        };
        Self {
            record: &done.record,
            success: done.outcome.is_success(),
            text,
            enrichment,
            failure,
            attempts: done.attempts,
        }
    }
}
