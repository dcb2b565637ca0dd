//! `info` command implementation.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use contracts::RelayBlueprint;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    server: ServerInfo,
    destination: DestinationInfo,
    await_completion: bool,
    sink_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sinks: Vec<SinkInfo>,
}

#[derive(Serialize)]
struct ServerInfo {
    listen: String,
    proxy_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    public_uri: Option<String>,
    max_body_bytes: u64,
}

#[derive(Serialize)]
struct DestinationInfo {
    uri: String,
    timeout_ms: u64,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    timeout_ms: u64,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    params: BTreeMap<String, String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&blueprint, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint, args);
    }

    Ok(())
}

fn build_config_info(blueprint: &RelayBlueprint, args: &InfoArgs) -> ConfigInfo {
    let sinks = if args.sinks {
        blueprint
            .sinks
            .iter()
            .map(|s| SinkInfo {
                name: s.name.clone(),
                sink_type: format!("{:?}", s.sink_type),
                timeout_ms: s.timeout_ms,
                params: s.params.clone().into_iter().collect(),
            })
            .collect()
    } else {
        Vec::new()
    };

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        server: ServerInfo {
            listen: blueprint.server.listen.clone(),
            proxy_path: blueprint.server.proxy_path.clone(),
            public_uri: blueprint.server.public_uri.clone(),
            max_body_bytes: blueprint.server.max_body_bytes,
        },
        destination: DestinationInfo {
            uri: blueprint.destination.uri.clone(),
            timeout_ms: blueprint.destination.timeout_ms,
        },
        await_completion: blueprint.replication.await_completion,
        sink_count: blueprint.sinks.len(),
        sinks,
    }
}

fn print_config_info(blueprint: &RelayBlueprint, args: &InfoArgs) {
    println!("=== Telemetry Relay Configuration ===\n");

    let server = &blueprint.server;
    println!("Server");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   ├─ Listen: {}", server.listen);
    println!("   ├─ Path: {}", server.proxy_path);
    println!("   ├─ Max body: {} bytes", server.max_body_bytes);
    match &server.public_uri {
        Some(uri) => println!("   └─ Public URI: {}", uri),
        None => println!("   └─ Public URI: (not set)"),
    }

    println!("\nDestination");
    println!("   ├─ URI: {}", blueprint.destination.uri);
    println!("   └─ Timeout: {} ms", blueprint.destination.timeout_ms);

    println!("\nReplication");
    println!(
        "   └─ Await completion: {}",
        blueprint.replication.await_completion
    );

    println!("\nSinks ({})", blueprint.sinks.len());
    for (i, sink) in blueprint.sinks.iter().enumerate() {
        let is_last = i == blueprint.sinks.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_prefix = if is_last { "   " } else { "│  " };

        println!("   {} {} ({:?})", prefix, sink.name, sink.sink_type);

        if args.sinks {
            println!("   {}  ├─ Timeout: {} ms", child_prefix, sink.timeout_ms);
            let params: BTreeMap<_, _> = sink.params.iter().collect();
            for (key, value) in params {
                println!("   {}  ├─ {}: {}", child_prefix, key, value);
            }
        }
    }

    println!();
}
