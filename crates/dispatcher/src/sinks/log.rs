//! LogSink - logs batch summary via tracing

use std::collections::BTreeSet;

use contracts::{ContractError, HeaderSet, ReplicationSink, TelemetryBatch};
use tracing::{info, instrument};

/// Sink that logs batch summaries for debugging
pub struct LogSink {
    name: String,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Distinct values of the records' `name` field
    fn record_kinds(batch: &TelemetryBatch) -> Vec<&str> {
        batch
            .iter()
            .filter_map(|record| record.get("name").and_then(|v| v.as_str()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    fn log_batch_summary(&self, batch: &TelemetryBatch, headers: &HeaderSet) {
        info!(
            sink = %self.name,
            records = batch.len(),
            headers = headers.len(),
            kinds = ?Self::record_kinds(batch),
            "TelemetryBatch received"
        );
    }
}

impl ReplicationSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_replicate",
        skip(self, batch, headers),
        fields(sink = %self.name, records = batch.len())
    )]
    async fn replicate(
        &self,
        batch: &TelemetryBatch,
        headers: &HeaderSet,
    ) -> Result<(), ContractError> {
        self.log_batch_summary(batch, headers);
        Ok(())
    }
}
