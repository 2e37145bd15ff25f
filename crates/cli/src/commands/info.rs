//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::DispatcherConfig;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    name: String,
    polling_interval_ms: u64,
    shutdown_timeout_ms: u64,
    window_capacity: u64,
    /// Registered types in priority order
    types: Vec<TypeInfo>,
}

#[derive(Serialize)]
struct TypeInfo {
    message_type: String,
    weight: u32,
    /// Share of the window the type is entitled to, in percent
    share_percent: f64,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let info = build_config_info(&config);
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn build_config_info(config: &DispatcherConfig) -> ConfigInfo {
    let window_capacity: u64 = config.registered_types.values().map(|w| *w as u64).sum();

    let mut types: Vec<TypeInfo> = config
        .registered_types
        .iter()
        .map(|(t, w)| TypeInfo {
            message_type: t.to_string(),
            weight: *w,
            share_percent: if window_capacity > 0 {
                *w as f64 * 100.0 / window_capacity as f64
            } else {
                0.0
            },
        })
        .collect();
    types.sort_by(|a, b| {
        b.weight
            .cmp(&a.weight)
            .then_with(|| a.message_type.cmp(&b.message_type))
    });

    ConfigInfo {
        name: config.name.clone(),
        polling_interval_ms: config.polling_interval_ms,
        shutdown_timeout_ms: config.shutdown_timeout_ms,
        window_capacity,
        types,
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               Dispatcher Configuration                       ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("⚙️  Dispatcher");
    println!("   ├─ Name: {}", info.name);
    println!("   ├─ Polling interval: {}ms", info.polling_interval_ms);
    println!("   ├─ Shutdown timeout: {}ms", info.shutdown_timeout_ms);
    println!("   └─ Window capacity: {}", info.window_capacity);

    println!("\n📬 Message Types ({}), by priority", info.types.len());
    for (i, t) in info.types.iter().enumerate() {
        let prefix = if i == info.types.len() - 1 { "└─" } else { "├─" };
        println!(
            "   {} {} (weight {}, {:.1}% of window)",
            prefix, t.message_type, t.weight, t.share_percent
        );
    }

    println!();
}
