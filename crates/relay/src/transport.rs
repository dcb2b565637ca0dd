//! Outbound transport to the canonical destination

use std::time::Duration;

use bytes::Bytes;
use contracts::{HeaderEntry, HeaderSet};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

use crate::error::{RelayError, Result};

/// Response obtained from the canonical destination
#[derive(Debug, Clone)]
pub struct RelayResponse {
    pub status: u16,
    pub headers: HeaderSet,
    pub body: Bytes,
}

impl RelayResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Long-lived, pooled client bound to one destination URI
#[derive(Debug, Clone)]
pub struct DestinationClient {
    uri: Url,
    client: Client,
}

impl DestinationClient {
    /// Bind to `uri`, which must be an absolute http(s) URI
    pub fn new(uri: &str, timeout: Duration) -> Result<Self> {
        let uri = parse_destination(uri)?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { uri, client })
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    /// POST `body` unchanged with the forwardable subset of `headers`
    ///
    /// Any HTTP status is a response; only transport failures are errors.
    pub async fn send(&self, body: Bytes, headers: &HeaderSet) -> Result<RelayResponse> {
        let forward = headers.split_for_forward();

        let response = self
            .client
            .post(self.uri.clone())
            .headers(to_header_map(&forward.general))
            .body(body)
            .headers(to_header_map(&forward.content))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status().as_u16();
        let headers = from_header_map(response.headers());
        let body = response.bytes().await.map_err(|e| self.transport_error(e))?;

        debug!(status, bytes = body.len(), "Destination responded");
        Ok(RelayResponse {
            status,
            headers,
            body,
        })
    }

    fn transport_error(&self, source: reqwest::Error) -> RelayError {
        RelayError::Destination {
            uri: self.uri.to_string(),
            source,
        }
    }
}

fn parse_destination(uri: &str) -> Result<Url> {
    let url = Url::parse(uri)
        .map_err(|e| RelayError::Config(format!("destination '{uri}' is not an absolute URI: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(RelayError::Config(format!(
            "destination '{uri}' has unsupported scheme '{other}'"
        ))),
    }
}

/// Framing is owned by the outbound client
fn is_framing_header(name: &str) -> bool {
    name.eq_ignore_ascii_case("transfer-encoding")
}

fn to_header_map(entries: &[HeaderEntry]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for entry in entries.iter().filter(|e| !is_framing_header(&e.name)) {
        let Ok(name) = HeaderName::from_bytes(entry.name.as_bytes()) else {
            warn!(header = %entry.name, "Dropping header with invalid name");
            continue;
        };
        for value in &entry.values {
            match HeaderValue::from_str(value) {
                Ok(value) => {
                    map.append(name.clone(), value);
                }
                Err(_) => warn!(header = %entry.name, "Dropping invalid header value"),
            }
        }
    }
    map
}

fn from_header_map(map: &HeaderMap) -> HeaderSet {
    map.iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}
