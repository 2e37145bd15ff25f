//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// prio-dispatch - weighted-fair message dispatcher host
#[derive(Parser, Debug)]
#[command(
    name = "prio-dispatch",
    author,
    version,
    about = "Priority-aware message dispatcher",
    long_about = "Buffers typed messages and feeds a capacity-limited channel using\n\
                  weighted-fair scheduling.\n\n\
                  `run` drives a dispatcher with generated load against a simulated\n\
                  channel and reports how each message type fared."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "PRIO_DISPATCH_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "PRIO_DISPATCH_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Drive a dispatcher with generated messages
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "dispatcher.toml",
        env = "PRIO_DISPATCH_CONFIG"
    )]
    pub config: PathBuf,

    /// Messages submitted per registered type
    #[arg(short = 'n', long, default_value = "10", env = "PRIO_DISPATCH_MESSAGES")]
    pub messages: usize,

    /// Concurrent sends the simulated channel accepts
    #[arg(long, default_value = "1", env = "PRIO_DISPATCH_MAX_IN_FLIGHT")]
    pub max_in_flight: usize,

    /// Simulated delivery latency per message in milliseconds
    #[arg(long, default_value = "20", env = "PRIO_DISPATCH_LATENCY_MS")]
    pub latency_ms: u64,

    /// Time-to-live of each generated message in milliseconds
    #[arg(long, default_value = "5000", env = "PRIO_DISPATCH_TTL_MS")]
    pub ttl_ms: i64,

    /// Override the polling interval from configuration
    #[arg(long)]
    pub polling_interval_ms: Option<u64>,

    #[command(flatten)]
    pub shutdown: ShutdownArgs,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "PRIO_DISPATCH_METRICS_PORT")]
    pub metrics_port: u16,
}

/// How the dispatcher is stopped once all messages are submitted
#[derive(Args, Debug, Clone, Default)]
#[group(multiple = false)]
pub struct ShutdownArgs {
    /// Stop accepting messages and deliver what is buffered
    #[arg(long)]
    pub drain: bool,

    /// Abandon whatever is still buffered
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "dispatcher.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "dispatcher.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_defaults() {
        let cli = Cli::parse_from(["prio-dispatch", "run"]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.messages, 10);
        assert_eq!(args.max_in_flight, 1);
        assert!(!args.shutdown.drain && !args.shutdown.force);
    }

    #[test]
    fn test_drain_and_force_conflict() {
        let result = Cli::try_parse_from(["prio-dispatch", "run", "--drain", "--force"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["prio-dispatch", "validate", "-c", "x.toml", "-vv"]);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_log_format_maps_to_observability() {
        let cli = Cli::parse_from(["prio-dispatch", "--log-format", "json", "info"]);
        assert_eq!(
            observability::LogFormat::from(cli.log_format),
            observability::LogFormat::Json
        );
    }
}
