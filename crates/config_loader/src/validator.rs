//! Configuration validation
//!
//! Rules:
//! - listen is a socket address
//! - proxy_path starts with '/'
//! - max_body_bytes > 0
//! - destination.uri and server.public_uri are absolute http(s) URIs
//! - sink names are non-empty and unique
//! - bulk_index sinks carry endpoint, index and type

use std::collections::HashSet;
use std::net::SocketAddr;

use contracts::{ContractError, RelayBlueprint, SinkType};
use url::Url;

const BULK_INDEX_REQUIRED_PARAMS: [&str; 3] = ["endpoint", "index", "type"];

/// Validate a RelayBlueprint
///
/// Returns the first error encountered.
pub fn validate(blueprint: &RelayBlueprint) -> Result<(), ContractError> {
    validate_server(blueprint)?;
    validate_destination(blueprint)?;
    validate_sinks(blueprint)?;
    Ok(())
}

fn validate_server(blueprint: &RelayBlueprint) -> Result<(), ContractError> {
    let server = &blueprint.server;

    if server.listen.parse::<SocketAddr>().is_err() {
        return Err(ContractError::config_validation(
            "server.listen",
            format!("'{}' is not a socket address", server.listen),
        ));
    }

    if !server.proxy_path.starts_with('/') {
        return Err(ContractError::config_validation(
            "server.proxy_path",
            format!("path must start with '/', got '{}'", server.proxy_path),
        ));
    }

    if server.max_body_bytes == 0 {
        return Err(ContractError::config_validation(
            "server.max_body_bytes",
            "max_body_bytes must be > 0",
        ));
    }

    if let Some(public_uri) = &server.public_uri {
        check_absolute_uri("server.public_uri", public_uri)?;
    }

    Ok(())
}

fn validate_destination(blueprint: &RelayBlueprint) -> Result<(), ContractError> {
    check_absolute_uri("destination.uri", &blueprint.destination.uri)
}

fn validate_sinks(blueprint: &RelayBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();

    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        if sink.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("sinks[{}].name", idx),
                "sink name cannot be empty",
            ));
        }

        if !seen.insert(sink.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("sinks[name={}]", sink.name),
                "duplicate sink name",
            ));
        }

        if sink.sink_type == SinkType::BulkIndex {
            for key in BULK_INDEX_REQUIRED_PARAMS {
                let present = sink.params.get(key).is_some_and(|v| !v.trim().is_empty());
                if !present {
                    return Err(ContractError::config_validation(
                        format!("sinks[{}].params.{}", sink.name, key),
                        format!("bulk_index sink requires param '{key}'"),
                    ));
                }
            }
            if let Some(endpoint) = sink.params.get("endpoint") {
                check_absolute_uri(&format!("sinks[{}].params.endpoint", sink.name), endpoint)?;
            }
        }
    }

    Ok(())
}

/// Require an absolute http or https URI
fn check_absolute_uri(field: &str, value: &str) -> Result<(), ContractError> {
    let url = Url::parse(value).map_err(|e| {
        ContractError::config_validation(field, format!("'{value}' is not an absolute URI: {e}"))
    })?;

    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ContractError::config_validation(
            field,
            format!("unsupported scheme '{other}', expected http or https"),
        )),
    }
}
