//! Relay service - binds the listener, serves until shutdown, drains replication.

use std::future::Future;
use std::time::Instant;

use anyhow::{Context, Result};
use contracts::RelayBlueprint;
use relay::TelemetryRelay;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::RunStats;

/// Service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// The relay blueprint configuration
    pub blueprint: RelayBlueprint,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Relay server lifecycle
pub struct RelayService {
    config: ServiceConfig,
}

impl RelayService {
    pub fn new(config: ServiceConfig) -> Self {
        Self { config }
    }

    /// Bind the configured listen address and serve until `shutdown`
    pub async fn run<F>(self, shutdown: F) -> Result<RunStats>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listen = self.config.blueprint.server.listen.clone();
        let listener = TcpListener::bind(listen.as_str())
            .await
            .with_context(|| format!("Failed to bind {listen}"))?;
        self.run_on(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown`
    pub async fn run_on<F>(self, listener: TcpListener, shutdown: F) -> Result<RunStats>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        // Initialize Metrics (optional)
        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        if blueprint.sinks.is_empty() {
            warn!("No sinks configured - batches are only forwarded");
        }

        let relay =
            TelemetryRelay::from_blueprint(blueprint).context("Failed to create relay")?;

        let local_addr = listener.local_addr().context("Listener has no address")?;
        info!(
            addr = %local_addr,
            path = %blueprint.server.proxy_path,
            destination = %relay.destination(),
            "Relay ready"
        );
        if let Some(ref public_uri) = blueprint.server.public_uri {
            info!(public_uri = %public_uri, "Point telemetry channels at this endpoint");
        }

        let app = relay::server::router(
            relay.clone(),
            &blueprint.server.proxy_path,
            blueprint.server.max_body_bytes,
        );
        relay::server::serve(listener, app, shutdown)
            .await
            .context("Relay server failed")?;

        // Drain background replication
        info!(
            pending = relay.dispatcher().pending(),
            "Server stopped, draining replication..."
        );
        relay.shutdown().await;

        let stats = RunStats {
            duration: start_time.elapsed(),
            relay: relay.metrics(),
            sinks: relay.dispatcher().metrics(),
        };

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            accepted = stats.relay.accepted,
            "Relay shutdown complete"
        );

        Ok(stats)
    }
}
