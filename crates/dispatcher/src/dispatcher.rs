//! Dispatcher - concurrent fan-out of one batch to every sink

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, instrument, warn};

use contracts::{ContractError, HeaderSet, ReplicationSink, SinkConfig, SinkType, TelemetryBatch};

use crate::error::DispatcherError;
use crate::handle::SinkHandle;
use crate::metrics::MetricsSnapshot;
use crate::sinks::{BulkIndexSink, LogSink};

/// One failed sink in a fan-out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkFailure {
    pub sink: String,
    pub error: String,
}

/// Outcome of one fan-out
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanOutReport {
    pub succeeded: usize,
    pub failed: Vec<SinkFailure>,
}

impl FanOutReport {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed.len()
    }
}

/// Builder for creating a Dispatcher
#[derive(Default)]
pub struct DispatcherBuilder {
    handles: Vec<SinkHandle>,
}

impl DispatcherBuilder {
    /// Create an empty DispatcherBuilder
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sink
    pub fn sink<S>(mut self, sink: S) -> Self
    where
        S: ReplicationSink + Sync + 'static,
    {
        self.handles.push(SinkHandle::new(sink));
        self
    }

    /// Register an already wrapped sink
    pub fn handle(mut self, handle: SinkHandle) -> Self {
        self.handles.push(handle);
        self
    }

    /// Register every sink described by `configs`
    #[instrument(
        name = "dispatcher_builder_configs",
        skip(self, configs),
        fields(sink_count = configs.len())
    )]
    pub fn configs(mut self, configs: &[SinkConfig]) -> Result<Self, DispatcherError> {
        for config in configs {
            self.handles.push(create_sink_handle(config)?);
        }
        Ok(self)
    }

    pub fn build(self) -> Dispatcher {
        Dispatcher::new(self.handles)
    }
}

/// Create a SinkHandle from configuration
#[instrument(
    name = "dispatcher_create_sink_handle",
    skip(config),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
pub fn create_sink_handle(config: &SinkConfig) -> Result<SinkHandle, DispatcherError> {
    let handle = match config.sink_type {
        SinkType::Log => SinkHandle::new(LogSink::new(&config.name)),
        SinkType::BulkIndex => {
            let sink = BulkIndexSink::from_params(&config.name, &config.params)
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
            SinkHandle::new(sink)
        }
    };

    let handle = if config.timeout_ms > 0 {
        handle.with_timeout(Duration::from_millis(config.timeout_ms))
    } else {
        handle
    };

    debug!(sink = %config.name, "Sink registered");
    Ok(handle)
}

/// Fans batches out to the fixed set of registered sinks
///
/// Clones share the sink set and the background task tracker.
#[derive(Clone)]
pub struct Dispatcher {
    handles: Arc<[SinkHandle]>,
    tracker: TaskTracker,
}

impl Dispatcher {
    /// Create a dispatcher with the given sink handles
    pub fn new(handles: Vec<SinkHandle>) -> Self {
        Self {
            handles: handles.into(),
            tracker: TaskTracker::new(),
        }
    }

    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// Number of registered sinks
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn sink_names(&self) -> Vec<&str> {
        self.handles.iter().map(SinkHandle::name).collect()
    }

    /// Get metrics for all sinks
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.handles
            .iter()
            .map(|h| (h.name().to_string(), h.metrics().snapshot()))
            .collect()
    }

    /// Background fan-outs still running
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Replicate to every sink concurrently and wait for all of them
    ///
    /// Each sink runs in its own task: an error or panic in one sink
    /// never affects its siblings.
    #[instrument(
        name = "dispatcher_fan_out",
        skip(self, batch, headers),
        fields(sinks = self.handles.len(), records = batch.len())
    )]
    pub async fn fan_out(&self, batch: TelemetryBatch, headers: HeaderSet) -> FanOutReport {
        let batch = Arc::new(batch);
        let headers = Arc::new(headers);

        let tasks: Vec<(String, JoinHandle<Result<(), ContractError>>)> = self
            .handles
            .iter()
            .map(|handle| {
                let handle = handle.clone();
                let batch = Arc::clone(&batch);
                let headers = Arc::clone(&headers);
                let name = handle.name().to_string();
                let task = tokio::spawn(async move { handle.replicate(batch, headers).await });
                (name, task)
            })
            .collect();

        let mut report = FanOutReport::default();
        for (sink, task) in tasks {
            match task.await {
                Ok(Ok(())) => report.succeeded += 1,
                Ok(Err(e)) => report.failed.push(SinkFailure {
                    sink,
                    error: e.to_string(),
                }),
                Err(e) => {
                    error!(sink = %sink, error = ?e, "Sink task did not complete");
                    report.failed.push(SinkFailure {
                        sink,
                        error: format!("sink task did not complete: {e}"),
                    });
                }
            }
        }

        if report.failed.is_empty() {
            debug!(succeeded = report.succeeded, "Fan-out complete");
        } else {
            warn!(
                succeeded = report.succeeded,
                failed = report.failed.len(),
                "Fan-out complete with failures"
            );
        }

        report
    }

    /// Start a fan-out without waiting for it
    ///
    /// The task is tracked; [`Dispatcher::shutdown`] waits for it.
    pub fn spawn_fan_out(&self, batch: TelemetryBatch, headers: HeaderSet) {
        let dispatcher = self.clone();
        self.tracker.spawn(async move {
            dispatcher.fan_out(batch, headers).await;
        });
    }

    /// Wait for every background fan-out to finish
    #[instrument(name = "dispatcher_shutdown", skip(self))]
    pub async fn shutdown(&self) {
        self.tracker.close();
        let pending = self.tracker.len();
        if pending > 0 {
            info!(pending, "Waiting for outstanding fan-outs");
        }
        self.tracker.wait().await;
        info!("Dispatcher shutdown complete");
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// Convenience function to create a dispatcher from sink configs
#[instrument(name = "dispatcher_create", skip(sink_configs))]
pub fn create_dispatcher(sink_configs: &[SinkConfig]) -> Result<Dispatcher, DispatcherError> {
    Ok(DispatcherBuilder::new().configs(sink_configs)?.build())
}
