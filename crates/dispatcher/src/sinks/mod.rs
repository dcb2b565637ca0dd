//! Sink implementations
//!
//! Contains LogSink and BulkIndexSink.

mod bulk_index;
mod log;

pub use self::bulk_index::{
    sanitize_keys, sanitize_record, static_index_selector, BulkIndexSink, BulkIndexSinkOptions,
    IndexDefinition, IndexSelector, KeyCollision,
};
pub use self::log::LogSink;
