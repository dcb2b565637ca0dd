//! # Dispatcher
//!
//! Sink fan-out module.
//!
//! Responsibilities:
//! - Hold the fixed set of registered sinks
//! - Fan one `TelemetryBatch` out to every sink concurrently
//! - Isolate sink failures and timeouts from siblings and from the caller
//! - Track background fan-outs so shutdown can drain them

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod sinks;

pub use contracts::{HeaderSet, ReplicationSink, TelemetryBatch};
pub use dispatcher::{
    create_dispatcher, create_sink_handle, Dispatcher, DispatcherBuilder, FanOutReport,
    SinkFailure,
};
pub use error::DispatcherError;
pub use handle::SinkHandle;
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use sinks::{
    sanitize_keys, sanitize_record, static_index_selector, BulkIndexSink, BulkIndexSinkOptions,
    IndexDefinition, IndexSelector, KeyCollision, LogSink,
};
