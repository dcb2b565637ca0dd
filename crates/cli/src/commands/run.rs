//! `run` command implementation.

use anyhow::{Context, Result};
use config_loader::{ConfigLoader, Overrides};
use contracts::RelayBlueprint;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::service::{RelayService, ServiceConfig};

/// Execute the `run` command
pub async fn run_relay(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let overrides = Overrides {
        listen: args.listen.clone(),
        destination: args.destination.clone(),
    };
    if !overrides.is_empty() {
        info!(
            listen = ?overrides.listen,
            destination = ?overrides.destination,
            "Applying CLI overrides"
        );
    }

    let blueprint = ConfigLoader::load_with_overrides(&args.config, &overrides)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    info!(
        listen = %blueprint.server.listen,
        destination = %blueprint.destination.uri,
        sinks = blueprint.sinks.len(),
        await_completion = blueprint.replication.await_completion,
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let service = RelayService::new(ServiceConfig {
        blueprint,
        metrics_port: if args.metrics_port == 0 {
            None
        } else {
            Some(args.metrics_port)
        },
    });

    info!("Starting relay...");

    let stats = service
        .run(shutdown_signal())
        .await
        .context("Relay execution failed")?;
    stats.print_summary();

    info!("Telemetry Relay finished");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    warn!("Received shutdown signal, stopping relay...");
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &RelayBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Server:");
    println!("  Listen: {}", blueprint.server.listen);
    println!("  Path: {}", blueprint.server.proxy_path);
    if let Some(ref public_uri) = blueprint.server.public_uri {
        println!("  Public URI: {}", public_uri);
    }
    println!("\nDestination:");
    println!("  URI: {}", blueprint.destination.uri);
    println!("  Timeout: {} ms", blueprint.destination.timeout_ms);

    if !blueprint.sinks.is_empty() {
        println!("\nSinks ({}):", blueprint.sinks.len());
        for sink in &blueprint.sinks {
            println!("  - {} ({:?})", sink.name, sink.sink_type);
        }
    }

    println!(
        "\nReplication: {}",
        if blueprint.replication.await_completion {
            "awaited before reply"
        } else {
            "background"
        }
    );
    println!();
}
