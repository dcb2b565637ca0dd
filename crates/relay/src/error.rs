//! Relay error types

use thiserror::Error;

/// Errors surfaced by [`crate::TelemetryRelay`]
#[derive(Debug, Error)]
pub enum RelayError {
    // ===== Construction =====
    /// Invalid relay configuration (destination, sinks)
    #[error("relay configuration error: {0}")]
    Config(String),

    /// Sink set could not be built
    #[error(transparent)]
    Sinks(#[from] dispatcher::DispatcherError),

    // ===== Request validation =====
    /// Body or headers absent
    #[error("invalid argument: {0} is required")]
    InvalidArgument(&'static str),

    /// Content-Length absent, non-positive, unparsable or too large
    #[error("invalid Content-Length: {0}")]
    ContentLength(String),

    /// Body was empty after a valid Content-Length
    #[error("request body is empty (declared Content-Length {declared})")]
    EmptyBody { declared: u64 },

    /// Body could not be read
    #[error("failed to read request body: {0}")]
    BodyRead(#[source] std::io::Error),

    // ===== Canonical forward =====
    /// Transport failure or timeout reaching the destination
    #[error("destination '{uri}' unreachable: {source}")]
    Destination {
        uri: String,
        #[source]
        source: reqwest::Error,
    },
}

impl RelayError {
    /// Whether the caller sent a malformed request
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_)
                | Self::ContentLength(_)
                | Self::EmptyBody { .. }
                | Self::BodyRead(_)
        )
    }

    /// Short label used for rejection metrics
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Config(_) | Self::Sinks(_) => "config",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::ContentLength(_) => "content_length",
            Self::EmptyBody { .. } => "empty_body",
            Self::BodyRead(_) => "body_read",
            Self::Destination { .. } => "destination",
        }
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
