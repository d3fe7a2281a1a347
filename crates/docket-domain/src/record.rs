//! Record module - one unit of input work for the extraction pipeline

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of a single pipeline invocation, based on UUIDv7
///
/// UUIDv7 keeps batch identifiers chronologically sortable, which makes
/// log lines from consecutive runs easy to tell apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(uuid::Uuid);

impl BatchId {
    /// Generate a new UUIDv7-based BatchId
    ///
    /// # Examples
    ///
    /// ```
    /// use docket_domain::BatchId;
    ///
    /// let a = BatchId::new();
    /// let b = BatchId::new();
    /// assert_ne!(a, b);
    /// ```
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7())
    }

    /// Parse a BatchId from its string form
    pub fn from_string(s: &str) -> Result<Self, String> {
        uuid::Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| format!("Invalid batch id: {}", e))
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identity of a record as supplied by the upstream source
///
/// Upstream lists use either integer or string identifiers, so both are
/// accepted as-is.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    /// Numeric identifier
    Int(i64),
    /// Free-form identifier
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(id) => write!(f, "{}", id),
            RecordId::Text(id) => f.write_str(id),
        }
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        RecordId::Int(id)
    }
}

impl From<i32> for RecordId {
    fn from(id: i32) -> Self {
        RecordId::Int(i64::from(id))
    }
}

impl From<usize> for RecordId {
    fn from(id: usize) -> Self {
        RecordId::Int(id as i64)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        RecordId::Text(id.to_string())
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        RecordId::Text(id)
    }
}

/// A record to be processed by the pipeline
///
/// Identity and position never change once the record enters the pipeline.
/// Outputs are not stored on the record itself; each job hands the record
/// back together with exactly one [`Outcome`](crate::Outcome).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Upstream identity
    pub id: RecordId,

    /// 0-based position in the input sequence (defines output order)
    #[serde(default)]
    pub position: usize,

    /// Locator of the document to extract (landing page or direct link)
    #[serde(
        default,
        rename = "meetingUrl",
        alias = "document_ref",
        skip_serializing_if = "Option::is_none"
    )]
    pub document_ref: Option<String>,

    /// Passthrough metadata from the upstream source
    #[serde(default, flatten)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Record {
    /// Create a record with no metadata
    pub fn new(id: impl Into<RecordId>, document_ref: Option<String>) -> Self {
        Self {
            id: id.into(),
            position: 0,
            document_ref,
            metadata: BTreeMap::new(),
        }
    }

    /// Attach a metadata field
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The document reference, if present and not blank
    pub fn reference(&self) -> Option<&str> {
        self.document_ref
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
    }

    /// Look up a string metadata field
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }
}

/// Assign input positions to a list of records
///
/// Positions are always derived from input order, overriding whatever the
/// caller put in the field.
pub fn assign_positions(records: &mut [Record]) {
    for (position, record) in records.iter_mut().enumerate() {
        record.position = position;
    }
}
