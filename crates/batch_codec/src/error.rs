//! Batch codec error types

use thiserror::Error;

/// Decode error: the whole batch is rejected
#[derive(Debug, Error)]
pub enum DecodeError {
    /// gzip stream could not be decompressed
    #[error("gzip decompression failed: {0}")]
    Gzip(#[source] std::io::Error),

    /// Payload is not UTF-8 text
    #[error("payload is not valid utf-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// Reconstructed array is not valid JSON, or a record is not an object
    #[error("malformed json payload: {0}")]
    Json(#[from] serde_json::Error),

    /// A line held more (or fewer) than one record
    #[error("expected {lines} records (one per line), parsed {records}")]
    RecordCount {
        /// Non-blank lines in the payload
        lines: usize,
        /// Records in the parsed array
        records: usize,
    },
}

/// Batch codec Result type alias
pub type Result<T> = std::result::Result<T, DecodeError>;
