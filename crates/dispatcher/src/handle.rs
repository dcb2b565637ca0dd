//! SinkHandle - type-erased, shareable sink with its own metrics and timeout

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{debug, error, instrument};

use contracts::{ContractError, HeaderSet, ReplicationSink, TelemetryBatch};

use crate::metrics::SinkMetrics;

type ReplicateFn = dyn Fn(Arc<TelemetryBatch>, Arc<HeaderSet>) -> BoxFuture<'static, Result<(), ContractError>>
    + Send
    + Sync;

/// Handle to a registered sink
///
/// Cheap to clone; every clone drives the same sink instance and shares
/// its metrics.
#[derive(Clone)]
pub struct SinkHandle {
    /// Sink name
    name: String,
    /// Erased `ReplicationSink::replicate`
    replicate: Arc<ReplicateFn>,
    /// Shared metrics
    metrics: Arc<SinkMetrics>,
    /// Per-replication timeout
    timeout: Option<Duration>,
}

impl SinkHandle {
    /// Wrap a sink
    pub fn new<S>(sink: S) -> Self
    where
        S: ReplicationSink + Sync + 'static,
    {
        let name = sink.name().to_string();
        let sink = Arc::new(sink);

        // A panic becomes this sink's error so the accounting below still runs.
        let sink_name = name.clone();
        let replicate = move |batch: Arc<TelemetryBatch>,
                              headers: Arc<HeaderSet>|
              -> BoxFuture<'static, Result<(), ContractError>> {
            let sink = Arc::clone(&sink);
            let sink_name = sink_name.clone();
            Box::pin(async move {
                AssertUnwindSafe(sink.replicate(&batch, &headers))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| {
                        Err(ContractError::sink_panicked(sink_name, panic_message(&*panic)))
                    })
            })
        };

        Self {
            name,
            replicate: Arc::new(replicate),
            metrics: Arc::new(SinkMetrics::new()),
            timeout: None,
        }
    }

    /// Bound every replication by `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Get sink name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Run one replication, recording the outcome
    #[instrument(
        name = "sink_replicate",
        skip(self, batch, headers),
        fields(sink = %self.name, records = batch.len())
    )]
    pub async fn replicate(
        &self,
        batch: Arc<TelemetryBatch>,
        headers: Arc<HeaderSet>,
    ) -> Result<(), ContractError> {
        let records = batch.len();
        let started = Instant::now();
        self.metrics.enter();

        let fut = (self.replicate)(batch, headers);
        let result = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, fut).await {
                Ok(result) => result,
                Err(_) => {
                    self.metrics.inc_timeout_count();
                    Err(ContractError::SinkTimeout {
                        sink_name: self.name.clone(),
                        timeout_ms: timeout.as_millis() as u64,
                    })
                }
            },
            None => fut.await,
        };

        self.metrics.exit();
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        match &result {
            Ok(()) => {
                self.metrics.inc_replicated(records);
                debug!(sink = %self.name, records, latency_ms, "Replication succeeded");
            }
            Err(e) => {
                self.metrics.inc_failure_count();
                error!(
                    sink = %self.name,
                    records,
                    latency_ms,
                    error = %e,
                    "Replication failed"
                );
            }
        }
        observability::record_sink_result(&self.name, result.is_ok(), latency_ms);

        result
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl std::fmt::Debug for SinkHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkHandle")
            .field("name", &self.name)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tokio::time::sleep;

    /// Mock sink for testing
    struct MockSink {
        name: String,
        write_count: Arc<AtomicU64>,
        should_fail: bool,
        delay_ms: u64,
    }

    impl ReplicationSink for MockSink {
        fn name(&self) -> &str {
            &self.name
        }

        async fn replicate(
            &self,
            _batch: &TelemetryBatch,
            _headers: &HeaderSet,
        ) -> Result<(), ContractError> {
            if self.delay_ms > 0 {
                sleep(Duration::from_millis(self.delay_ms)).await;
            }
            if self.should_fail {
                return Err(ContractError::sink_write(&self.name, "mock failure"));
            }
            self.write_count.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
    }

    fn mock(name: &str, should_fail: bool, delay_ms: u64) -> (MockSink, Arc<AtomicU64>) {
        let write_count = Arc::new(AtomicU64::new(0));
        let sink = MockSink {
            name: name.to_string(),
            write_count: Arc::clone(&write_count),
            should_fail,
            delay_ms,
        };
        (sink, write_count)
    }

    fn empty_inputs() -> (Arc<TelemetryBatch>, Arc<HeaderSet>) {
        (
            Arc::new(TelemetryBatch::default()),
            Arc::new(HeaderSet::default()),
        )
    }

    #[tokio::test]
    async fn test_sink_handle_basic() {
        let (sink, write_count) = mock("test", false, 0);
        let handle = SinkHandle::new(sink);
        assert_eq!(handle.name(), "test");

        for _ in 0..5 {
            let (batch, headers) = empty_inputs();
            handle.replicate(batch, headers).await.unwrap();
        }

        assert_eq!(write_count.load(Ordering::Relaxed), 5);
        assert_eq!(handle.metrics().replicated_count(), 5);
        assert_eq!(handle.metrics().in_flight(), 0);
    }

    #[tokio::test]
    async fn test_sink_handle_failure_recorded() {
        let (sink, _) = mock("failing", true, 0);
        let handle = SinkHandle::new(sink);

        let (batch, headers) = empty_inputs();
        let result = handle.replicate(batch, headers).await;

        assert!(matches!(result, Err(ContractError::SinkWrite { .. })));
        assert_eq!(handle.metrics().failure_count(), 1);
        assert_eq!(handle.metrics().replicated_count(), 0);
    }

    #[tokio::test]
    async fn test_sink_handle_timeout() {
        let (sink, write_count) = mock("slow", false, 500);
        let handle = SinkHandle::new(sink).with_timeout(Duration::from_millis(20));

        let (batch, headers) = empty_inputs();
        let result = handle.replicate(batch, headers).await;

        assert!(matches!(result, Err(ContractError::SinkTimeout { .. })));
        assert_eq!(write_count.load(Ordering::Relaxed), 0);
        assert_eq!(handle.metrics().timeout_count(), 1);
        assert_eq!(handle.metrics().failure_count(), 1);
    }

    struct PanickingSink;

    impl ReplicationSink for PanickingSink {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn replicate(
            &self,
            _batch: &TelemetryBatch,
            _headers: &HeaderSet,
        ) -> Result<(), ContractError> {
            panic!("index out of range")
        }
    }

    #[tokio::test]
    async fn test_sink_handle_panic_recorded() {
        let handle = SinkHandle::new(PanickingSink);

        let (batch, headers) = empty_inputs();
        let result = handle.replicate(batch, headers).await;

        match result {
            Err(ContractError::SinkPanicked { sink_name, message }) => {
                assert_eq!(sink_name, "panicking");
                assert_eq!(message, "index out of range");
            }
            other => panic!("expected SinkPanicked, got {other:?}"),
        }
        assert_eq!(handle.metrics().failure_count(), 1);
        assert_eq!(handle.metrics().in_flight(), 0);
    }

    #[tokio::test]
    async fn test_sink_handle_clones_share_metrics() {
        let (sink, _) = mock("shared", false, 0);
        let handle = SinkHandle::new(sink);
        let clone = handle.clone();

        let (batch, headers) = empty_inputs();
        clone.replicate(batch, headers).await.unwrap();

        assert_eq!(handle.metrics().replicated_count(), 1);
    }
}
