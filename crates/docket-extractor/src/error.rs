//! Error types for the Extractor

use docket_domain::FailureReason;
use thiserror::Error;

/// Errors that can occur while turning a record into text
///
/// `Clone` because a single failed download is handed to every caller that
/// was waiting on the same document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    /// Record has no usable document reference
    #[error("empty or missing document reference")]
    MissingReference,

    /// Landing page or document could not be retrieved
    #[error("{}", fetch_message(.status, .message))]
    Fetch {
        /// HTTP status, when a response was received
        status: Option<u16>,
        /// Human-readable detail
        message: String,
    },

    /// Landing page has no usable minutes link
    #[error("Link error: {0}")]
    Link(String),

    /// Document was retrieved but holds no readable text
    #[error("Parse error: {0}")]
    Parse(String),

    /// Worker-side failure unrelated to the document
    #[error("Internal error: {0}")]
    Internal(String),
}

fn fetch_message(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("HTTP {}: {}", code, message),
        None => format!("Fetch error: {}", message),
    }
}

impl ExtractError {
    /// Fetch failure carrying an HTTP status
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        ExtractError::Fetch {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Fetch failure without a response
    pub fn transport(message: impl Into<String>) -> Self {
        ExtractError::Fetch {
            status: None,
            message: message.into(),
        }
    }
}

impl From<ExtractError> for FailureReason {
    fn from(e: ExtractError) -> Self {
        match e {
            ExtractError::MissingReference => FailureReason::MissingReference,
            ExtractError::Fetch { status, message } => FailureReason::Fetch { status, message },
            ExtractError::Link(message) => FailureReason::Link { message },
            ExtractError::Parse(message) => FailureReason::Parse { message },
            ExtractError::Internal(message) => FailureReason::Internal { message },
        }
    }
}
