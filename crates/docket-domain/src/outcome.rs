//! Outcome module - the terminal result of processing one record

use crate::enrichment::Enrichment;
use crate::record::{Record, RecordId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Stage of the pipeline at which a record failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    /// Record had nothing to look up
    Lookup,
    /// Landing page or document retrieval failed
    Fetch,
    /// Document retrieved but unreadable as text
    Parse,
    /// Job exceeded its time budget
    Timeout,
    /// Batch stopped before the job ran or completed
    Cancelled,
    /// Job died without reporting (panic or lost task)
    Internal,
}

impl FailureStage {
    /// Get the stage name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureStage::Lookup => "lookup",
            FailureStage::Fetch => "fetch",
            FailureStage::Parse => "parse",
            FailureStage::Timeout => "timeout",
            FailureStage::Cancelled => "cancelled",
            FailureStage::Internal => "internal",
        }
    }
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed reason a record produced no text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// Record has no document reference
    MissingReference,

    /// Network or HTTP failure
    Fetch {
        /// HTTP status, when a response was received
        status: Option<u16>,
        /// Human-readable detail
        message: String,
    },

    /// Landing page had no usable minutes link
    Link {
        /// Human-readable detail
        message: String,
    },

    /// Document could not be turned into text
    Parse {
        /// Human-readable detail
        message: String,
    },

    /// Job exceeded its budget
    Timeout {
        /// Budget that was exceeded, in milliseconds
        after_ms: u64,
    },

    /// Batch was cancelled before this record resolved
    Cancelled,

    /// Job vanished without reporting
    Internal {
        /// Human-readable detail
        message: String,
    },
}

impl FailureReason {
    /// Pipeline stage this failure belongs to
    pub fn stage(&self) -> FailureStage {
        match self {
            FailureReason::MissingReference => FailureStage::Lookup,
            FailureReason::Fetch { .. } | FailureReason::Link { .. } => FailureStage::Fetch,
            FailureReason::Parse { .. } => FailureStage::Parse,
            FailureReason::Timeout { .. } => FailureStage::Timeout,
            FailureReason::Cancelled => FailureStage::Cancelled,
            FailureReason::Internal { .. } => FailureStage::Internal,
        }
    }

    /// Whether another attempt could plausibly succeed
    ///
    /// Only transient fetch failures qualify: transport errors (no status),
    /// 408, 429 and 5xx responses.
    pub fn is_retryable(&self) -> bool {
        match self {
            FailureReason::Fetch { status: None, .. } => true,
            FailureReason::Fetch { status: Some(code), .. } => {
                *code == 408 || *code == 429 || (500..600).contains(code)
            }
            _ => false,
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::MissingReference => write!(f, "empty or missing document reference"),
            FailureReason::Fetch { status: Some(code), message } => write!(f, "HTTP {}: {}", code, message),
            FailureReason::Fetch { status: None, message } => write!(f, "fetch failed: {}", message),
            FailureReason::Link { message } => write!(f, "no document link: {}", message),
            FailureReason::Parse { message } => write!(f, "parse failed: {}", message),
            FailureReason::Timeout { after_ms } => write!(f, "timed out after {}ms", after_ms),
            FailureReason::Cancelled => write!(f, "cancelled"),
            FailureReason::Internal { message } => write!(f, "internal error: {}", message),
        }
    }
}

/// Result of processing one record
///
/// Enrichment is best-effort: a record whose text was extracted but whose
/// enrichment failed is still a `Success`, with `enrichment` unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// Text was extracted
    Success {
        /// Extracted plain text (shared between records with the same document)
        text: Arc<str>,
        /// Structured data, if enrichment ran and succeeded
        #[serde(default, skip_serializing_if = "Option::is_none")]
        enrichment: Option<Enrichment>,
    },

    /// No text could be produced
    Failure {
        /// Why
        reason: FailureReason,
    },
}

impl Outcome {
    /// Successful outcome without enrichment
    pub fn success(text: impl Into<Arc<str>>) -> Self {
        Outcome::Success {
            text: text.into(),
            enrichment: None,
        }
    }

    /// Failed outcome
    pub fn failure(reason: FailureReason) -> Self {
        Outcome::Failure { reason }
    }

    /// Whether text was extracted
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    /// Extracted text, if any
    pub fn text(&self) -> Option<&str> {
        match self {
            Outcome::Success { text, .. } => Some(text),
            Outcome::Failure { .. } => None,
        }
    }

    /// Enrichment data, if any
    pub fn enrichment(&self) -> Option<&Enrichment> {
        match self {
            Outcome::Success { enrichment, .. } => enrichment.as_ref(),
            Outcome::Failure { .. } => None,
        }
    }

    /// Failure reason, if any
    pub fn failure_reason(&self) -> Option<&FailureReason> {
        match self {
            Outcome::Success { .. } => None,
            Outcome::Failure { reason } => Some(reason),
        }
    }
}

/// A record paired with its single outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordOutcome {
    /// The record as it entered the pipeline
    pub record: Record,

    /// What happened to it
    pub outcome: Outcome,

    /// Number of attempts made (0 if never started)
    pub attempts: u32,

    /// Wall-clock time spent on the job in milliseconds
    pub elapsed_ms: u64,
}

impl RecordOutcome {
    /// Input position of the record
    pub fn position(&self) -> usize {
        self.record.position
    }

    /// Outcome for a record that never ran
    pub fn never_started(record: Record, reason: FailureReason) -> Self {
        Self {
            record,
            outcome: Outcome::failure(reason),
            attempts: 0,
            elapsed_ms: 0,
        }
    }
}

/// One line of the failure ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureEntry {
    /// Input position of the failed record
    pub position: usize,

    /// Upstream identity of the failed record
    pub record_id: RecordId,

    /// Why it failed
    pub reason: FailureReason,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_mapping() {
        assert_eq!(FailureReason::MissingReference.stage(), FailureStage::Lookup);
        assert_eq!(
            FailureReason::Fetch { status: Some(404), message: "not found".into() }.stage(),
            FailureStage::Fetch
        );
        assert_eq!(FailureReason::Parse { message: "bad".into() }.stage(), FailureStage::Parse);
        assert_eq!(FailureReason::Timeout { after_ms: 10 }.stage(), FailureStage::Timeout);
        assert_eq!(FailureReason::Cancelled.stage(), FailureStage::Cancelled);
        assert_eq!(FailureReason::Link { message: "none".into() }.stage(), FailureStage::Fetch);
    }

    #[test]
    fn test_retryable_failures() {
        let transport = FailureReason::Fetch { status: None, message: "reset".into() };
        let unavailable = FailureReason::Fetch { status: Some(503), message: "busy".into() };
        let throttled = FailureReason::Fetch { status: Some(429), message: "slow down".into() };
        let missing = FailureReason::Fetch { status: Some(404), message: "gone".into() };

        assert!(transport.is_retryable());
        assert!(unavailable.is_retryable());
        assert!(throttled.is_retryable());
        assert!(!missing.is_retryable());
        assert!(!FailureReason::MissingReference.is_retryable());
        assert!(!FailureReason::Parse { message: "x".into() }.is_retryable());
        assert!(!FailureReason::Timeout { after_ms: 5 }.is_retryable());
        assert!(!FailureReason::Link { message: "no 'read the minutes' link found".into() }.is_retryable());
    }

    #[test]
    fn test_outcome_accessors() {
        let ok = Outcome::success("minutes text");
        assert!(ok.is_success());
        assert_eq!(ok.text(), Some("minutes text"));
        assert!(ok.enrichment().is_none());
        assert!(ok.failure_reason().is_none());

        let failed = Outcome::failure(FailureReason::Cancelled);
        assert!(!failed.is_success());
        assert!(failed.text().is_none());
        assert_eq!(failed.failure_reason(), Some(&FailureReason::Cancelled));
    }

    #[test]
    fn test_outcome_serialization_shape() {
        let failed = Outcome::failure(FailureReason::Fetch {
            status: Some(404),
            message: "Page not found".into(),
        });
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["status"], "failure");
        assert_eq!(json["reason"]["kind"], "fetch");
        assert_eq!(json["reason"]["status"], 404);

        let ok = Outcome::success("text");
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["text"], "text");
        assert!(json.get("enrichment").is_none());
    }

    #[test]
    fn test_failure_display() {
        let reason = FailureReason::Fetch { status: Some(500), message: "PDF download failed".into() };
        assert_eq!(reason.to_string(), "HTTP 500: PDF download failed");
        assert_eq!(FailureReason::Timeout { after_ms: 250 }.to_string(), "timed out after 250ms");
    }
}
