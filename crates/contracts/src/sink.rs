//! ReplicationSink trait - Dispatcher output interface
//!
//! Defines the abstract interface for secondary sinks.

use crate::{ContractError, HeaderSet, TelemetryBatch};

/// Secondary telemetry destination
///
/// All sink implementations must implement this trait. Sinks only get
/// shared access to the batch and headers: siblings run concurrently
/// against the same values.
#[trait_variant::make(ReplicationSink: Send)]
pub trait LocalReplicationSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Replicate one decoded batch to the sink's own destination
    ///
    /// # Errors
    /// Returns transport or formatting error (should include context)
    async fn replicate(&self, batch: &TelemetryBatch, headers: &HeaderSet)
        -> Result<(), ContractError>;
}
