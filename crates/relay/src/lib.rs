//! # Relay
//!
//! Relay engine and its HTTP surface.
//!
//! Responsibilities:
//! - Validate inbound request framing (`Content-Length`, non-empty body)
//! - Forward the raw body to the canonical destination and return its response
//! - Decode the batch and fan it out to the registered sinks
//! - Expose the engine through an axum router
//!
//! ## Usage Example
//!
//! ```ignore
//! let relay = TelemetryRelay::from_blueprint(&blueprint)?;
//! let app = relay::server::router(relay.clone(), "/v2/track", 32 * 1024 * 1024);
//! relay::server::serve(listener, app, shutdown_signal()).await?;
//! relay.shutdown().await;
//! ```

mod engine;
mod error;
mod metrics;
pub mod server;
mod transport;

pub use engine::{RelayOptions, TelemetryRelay};
pub use error::{RelayError, Result};
pub use metrics::{RelayMetrics, RelayMetricsSnapshot};
pub use transport::{DestinationClient, RelayResponse};
