//! TelemetryRelay - forward to the canonical destination, then replicate

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use contracts::{HeaderSet, RelayBlueprint, TelemetryBatch, DEFAULT_DESTINATION_URI};
use dispatcher::{create_dispatcher, Dispatcher};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info, instrument, warn};

use crate::error::{RelayError, Result};
use crate::metrics::{RelayMetrics, RelayMetricsSnapshot};
use crate::transport::{DestinationClient, RelayResponse};

/// Relay construction options
#[derive(Debug, Clone)]
pub struct RelayOptions {
    /// Absolute URI of the canonical collector
    pub destination: String,
    pub destination_timeout: Duration,
    /// Largest accepted Content-Length
    pub max_body_bytes: u64,
    /// Wait for every sink before returning from `process`
    pub await_completion: bool,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            destination: DEFAULT_DESTINATION_URI.to_string(),
            destination_timeout: Duration::from_secs(30),
            max_body_bytes: 32 * 1024 * 1024,
            await_completion: false,
        }
    }
}

impl From<&RelayBlueprint> for RelayOptions {
    fn from(blueprint: &RelayBlueprint) -> Self {
        Self {
            destination: blueprint.destination.uri.clone(),
            destination_timeout: Duration::from_millis(blueprint.destination.timeout_ms),
            max_body_bytes: blueprint.server.max_body_bytes,
            await_completion: blueprint.replication.await_completion,
        }
    }
}

/// The relay engine
///
/// Destination and sink set are fixed at construction and shared by every
/// request; clones are cheap.
#[derive(Clone)]
pub struct TelemetryRelay {
    destination: DestinationClient,
    dispatcher: Dispatcher,
    max_body_bytes: u64,
    await_completion: bool,
    metrics: Arc<RelayMetrics>,
}

impl TelemetryRelay {
    /// Create a relay
    ///
    /// # Errors
    /// `RelayError::Config` when the destination is not an absolute http(s) URI.
    pub fn new(options: RelayOptions, dispatcher: Dispatcher) -> Result<Self> {
        if options.max_body_bytes == 0 {
            return Err(RelayError::Config("max_body_bytes must be > 0".into()));
        }
        let destination =
            DestinationClient::new(&options.destination, options.destination_timeout)?;

        info!(
            destination = %destination.uri(),
            sinks = ?dispatcher.sink_names(),
            await_completion = options.await_completion,
            "Relay created"
        );

        Ok(Self {
            destination,
            dispatcher,
            max_body_bytes: options.max_body_bytes,
            await_completion: options.await_completion,
            metrics: Arc::new(RelayMetrics::new()),
        })
    }

    /// Build the relay and its sinks from a loaded configuration
    pub fn from_blueprint(blueprint: &RelayBlueprint) -> Result<Self> {
        let dispatcher = create_dispatcher(&blueprint.sinks)?;
        Self::new(RelayOptions::from(blueprint), dispatcher)
    }

    pub fn destination(&self) -> &str {
        self.destination.uri().as_str()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn metrics(&self) -> RelayMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Relay one telemetry request
    ///
    /// The body is forwarded to the destination before anything else; the
    /// destination's response is the return value whatever the sinks do.
    /// A non-2xx answer is returned as is, transport failures are errors.
    #[instrument(
        name = "relay_process",
        skip(self, body, headers),
        fields(sinks = self.dispatcher.len())
    )]
    pub async fn process<R>(
        &self,
        body: Option<R>,
        headers: Option<&HeaderSet>,
    ) -> Result<RelayResponse>
    where
        R: AsyncRead + Unpin,
    {
        let (raw, headers) = match self.read_request(body, headers).await {
            Ok(request) => request,
            Err(e) => {
                self.metrics.inc_rejected();
                observability::record_request_rejected(e.reason());
                warn!(error = %e, "Request rejected");
                return Err(e);
            }
        };
        self.metrics.inc_accepted();
        debug!(bytes = raw.len(), "Request accepted");

        let response = self.forward(raw.clone(), headers).await?;

        if !self.dispatcher.is_empty() {
            self.replicate(&raw, headers).await;
        }

        Ok(response)
    }

    /// Validate framing and read exactly the declared body
    async fn read_request<'h, R>(
        &self,
        body: Option<R>,
        headers: Option<&'h HeaderSet>,
    ) -> Result<(Bytes, &'h HeaderSet)>
    where
        R: AsyncRead + Unpin,
    {
        let body = body.ok_or(RelayError::InvalidArgument("body"))?;
        let headers = headers.ok_or(RelayError::InvalidArgument("headers"))?;
        let declared = self.content_length(headers)?;

        let mut raw = Vec::with_capacity(initial_capacity(declared));
        body.take(declared)
            .read_to_end(&mut raw)
            .await
            .map_err(RelayError::BodyRead)?;

        if raw.is_empty() {
            return Err(RelayError::EmptyBody { declared });
        }
        Ok((Bytes::from(raw), headers))
    }

    fn content_length(&self, headers: &HeaderSet) -> Result<u64> {
        let value = headers
            .first("content-length")
            .ok_or_else(|| RelayError::ContentLength("header is absent".into()))?;
        let length: i64 = value
            .trim()
            .parse()
            .map_err(|_| RelayError::ContentLength(format!("'{value}' is not an integer")))?;

        if length <= 0 {
            return Err(RelayError::ContentLength(format!(
                "must be positive, got {length}"
            )));
        }
        let length = length as u64;
        if length > self.max_body_bytes {
            return Err(RelayError::ContentLength(format!(
                "{length} exceeds the {} byte limit",
                self.max_body_bytes
            )));
        }
        Ok(length)
    }

    async fn forward(&self, raw: Bytes, headers: &HeaderSet) -> Result<RelayResponse> {
        let started = Instant::now();
        let response = match self.destination.send(raw, headers).await {
            Ok(response) => response,
            Err(e) => {
                self.metrics.inc_destination_errors();
                observability::record_destination_error();
                warn!(error = %e, "Canonical forward failed");
                return Err(e);
            }
        };

        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.metrics
            .record_destination(response.is_success(), latency_ms);
        observability::record_destination_response(response.status, latency_ms);

        if response.is_success() {
            debug!(status = response.status, latency_ms, "Canonical forward completed");
        } else {
            warn!(
                status = response.status,
                latency_ms,
                "Canonical destination answered with a failure status"
            );
        }
        Ok(response)
    }

    /// Decode and fan out; failures here never reach the caller
    async fn replicate(&self, raw: &[u8], headers: &HeaderSet) {
        let batch: TelemetryBatch =
            match batch_codec::decode(raw, headers.get_all("content-encoding")) {
                Ok(batch) => batch,
                Err(e) => {
                    self.metrics.inc_decode_failures();
                    observability::record_decode_failure();
                    warn!(error = %e, "Batch decode failed, skipping replication");
                    return;
                }
            };

        self.metrics.inc_decoded(batch.len());
        observability::record_batch_decoded(batch.len());
        debug!(records = batch.len(), "Batch decoded");

        if batch.is_empty() {
            debug!("Empty batch, skipping replication");
            return;
        }

        let sink_headers = headers.without_host_specific();
        self.metrics.inc_fan_outs();

        if self.await_completion {
            self.dispatcher.fan_out(batch, sink_headers).await;
        } else {
            self.dispatcher.spawn_fan_out(batch, sink_headers);
            observability::record_pending_fan_outs(self.dispatcher.pending());
        }
    }

    /// Wait for background replication to drain
    pub async fn shutdown(&self) {
        self.dispatcher.shutdown().await;
    }
}

/// Preallocation for a body read; larger bodies grow as bytes arrive
const INITIAL_BODY_CAPACITY: usize = 64 * 1024;

fn initial_capacity(declared: u64) -> usize {
    usize::try_from(declared).map_or(INITIAL_BODY_CAPACITY, |n| n.min(INITIAL_BODY_CAPACITY))
}

impl std::fmt::Debug for TelemetryRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryRelay")
            .field("destination", &self.destination.uri().as_str())
            .field("sinks", &self.dispatcher.sink_names())
            .field("await_completion", &self.await_completion)
            .finish()
    }
}
