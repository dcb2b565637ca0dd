//! TelemetryBatch - Batch Codec output
//!
//! One decoded request body, shared read-only by all sinks.

use serde::Serialize;
use serde_json::{Map, Value};

/// A single telemetry record (one NDJSON line)
pub type Record = Map<String, Value>;

/// Ordered sequence of telemetry records decoded from one request body.
///
/// The batch is immutable after construction: sinks run concurrently
/// against the same instance and only get shared access.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TelemetryBatch {
    records: Vec<Record>,
}

impl TelemetryBatch {
    /// Create a batch from records in arrival order
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in arrival order
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }
}

impl From<Vec<Record>> for TelemetryBatch {
    fn from(records: Vec<Record>) -> Self {
        Self::new(records)
    }
}

impl<'a> IntoIterator for &'a TelemetryBatch {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
