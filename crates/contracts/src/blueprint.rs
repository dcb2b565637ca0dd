//! RelayBlueprint - Config Loader output
//!
//! Describes the complete relay deployment: listener, canonical destination,
//! replication mode and the registered sinks.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default canonical collector endpoint
pub const DEFAULT_DESTINATION_URI: &str = "https://dc.services.visualstudio.com/v2/track";

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete relay configuration blueprint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayBlueprint {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Inbound listener settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Canonical destination
    #[serde(default)]
    pub destination: DestinationConfig,

    /// Fan-out behaviour
    #[serde(default)]
    pub replication: ReplicationConfig,

    /// Secondary sinks
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
}

/// Inbound listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Path telemetry channels post to; must start with '/'
    #[serde(default = "default_proxy_path")]
    pub proxy_path: String,

    /// Advertised self-URI of the relay (informational)
    #[serde(default)]
    pub public_uri: Option<String>,

    /// Upper bound for a declared Content-Length
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            proxy_path: default_proxy_path(),
            public_uri: None,
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_proxy_path() -> String {
    "/v2/track".to_string()
}

fn default_max_body_bytes() -> u64 {
    32 * 1024 * 1024
}

/// Canonical destination settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationConfig {
    /// Absolute URI of the canonical collector
    #[serde(default = "default_destination_uri")]
    pub uri: String,

    /// Network timeout for the forward (milliseconds)
    #[serde(default = "default_destination_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            uri: default_destination_uri(),
            timeout_ms: default_destination_timeout_ms(),
        }
    }
}

fn default_destination_uri() -> String {
    DEFAULT_DESTINATION_URI.to_string()
}

fn default_destination_timeout_ms() -> u64 {
    30_000
}

/// Fan-out behaviour
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ReplicationConfig {
    /// Await sink completion before answering the caller
    #[serde(default)]
    pub await_completion: bool,
}

/// Sink configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Sink name (unique)
    pub name: String,

    /// Sink type
    pub sink_type: SinkType,

    /// Network timeout for one replication (milliseconds)
    #[serde(default = "default_sink_timeout_ms")]
    pub timeout_ms: u64,

    /// Sink-specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_sink_timeout_ms() -> u64 {
    10_000
}

/// Sink type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// Log batch summaries
    Log,
    /// Search/analytics bulk indexing API
    BulkIndex,
}
