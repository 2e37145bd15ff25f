//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{error, info};

use crate::cli::RunArgs;
use crate::load::{LoadConfig, LoadGenerator, ShutdownMode};

/// Execute the `run` command
pub async fn run_load(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let mut config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if let Some(polling_interval_ms) = args.polling_interval_ms {
        info!(polling_interval_ms, "Overriding polling interval from CLI");
        config.polling_interval_ms = polling_interval_ms;
        config_loader::ConfigLoader::validate(&config)
            .context("Invalid polling interval override")?;
    }

    info!(
        dispatcher = %config.name,
        types = config.registered_types.len(),
        polling_interval_ms = config.polling_interval_ms,
        "Configuration loaded"
    );

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
    }

    let load = LoadConfig {
        dispatcher: config,
        messages_per_type: args.messages,
        max_in_flight: args.max_in_flight,
        latency: Duration::from_millis(args.latency_ms),
        ttl_ms: args.ttl_ms,
        shutdown: shutdown_mode(args),
    };

    info!("Starting load run...");
    let stats = LoadGenerator::new(load)
        .run_until(shutdown_signal())
        .await
        .context("Load run failed")?;

    info!(
        submitted = stats.submitted,
        sent = stats.delivery.total_sent(),
        duration_secs = stats.duration.as_secs_f64(),
        "Load run completed"
    );
    stats.print_summary();

    Ok(())
}

fn shutdown_mode(args: &RunArgs) -> ShutdownMode {
    if args.shutdown.force {
        ShutdownMode::Force
    } else if args.shutdown.drain {
        ShutdownMode::Drain
    } else {
        ShutdownMode::Wait
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
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
                error!(error = %e, "Failed to install SIGTERM handler");
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
}
