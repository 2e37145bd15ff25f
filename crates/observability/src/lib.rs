//! # Observability
//!
//! Tracing + Prometheus metrics for dispatcher hosts.
//!
//! ## Features
//!
//! - Tracing initialisation (JSON/Pretty/Compact)
//! - Prometheus exporter installation
//! - Dispatcher metric helpers and in-memory delivery statistics
//!
//! ## Usage
//!
//! ```ignore
//! use observability::{init_with_config, LogFormat, ObservabilityConfig};
//!
//! init_with_config(ObservabilityConfig::from_verbosity(LogFormat::Json, 1, false))?;
//! observability::record_message_sent("notifications");
//! ```

pub mod metrics;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt, EnvFilter, Layer,
};

pub use crate::metrics::{
    record_buffer_size, record_buffer_wait_ms, record_message_expired,
    record_message_force_completed, record_message_rejected, record_message_send_failed,
    record_message_sent, record_message_submitted, DeliveryStatsAggregator, DeliverySummary,
    RunningStats, StatsSummary, TypeSummary,
};

/// Subscriber settings chosen by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservabilityConfig {
    pub log_format: LogFormat,
    /// Filter used when `RUST_LOG` is unset or ignored
    pub default_filter: String,
    /// Let `RUST_LOG` override `default_filter`
    pub honour_env: bool,
    /// Prometheus listener port; `None` leaves metrics to the host
    pub metrics_port: Option<u16>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            default_filter: "info".to_string(),
            honour_env: true,
            metrics_port: None,
        }
    }
}

impl ObservabilityConfig {
    /// Map `-v` counts and `--quiet` onto a filter.
    ///
    /// Quiet wins and ignores `RUST_LOG`.
    pub fn from_verbosity(log_format: LogFormat, verbose: u8, quiet: bool) -> Self {
        let default_filter = match (quiet, verbose) {
            (true, _) => "warn",
            (false, 0) => "info",
            (false, 1) => "debug",
            (false, _) => "trace",
        };
        Self {
            log_format,
            default_filter: default_filter.to_string(),
            honour_env: !quiet,
            metrics_port: None,
        }
    }

    fn filter(&self) -> EnvFilter {
        if self.honour_env {
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&self.default_filter))
        } else {
            EnvFilter::new(&self.default_filter)
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Structured JSON
    Json,
    /// Human readable
    #[default]
    Pretty,
    /// Compact single line
    Compact,
}

fn fmt_layer<S>(format: LogFormat) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
    }
}

/// Install the global subscriber and, if configured, the Prometheus recorder
pub fn init_with_config(config: ObservabilityConfig) -> Result<()> {
    tracing_subscriber::registry()
        .with(config.filter())
        .with(fmt_layer(config.log_format))
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    if let Some(port) = config.metrics_port {
        init_metrics_only(port)?;
    }

    tracing::debug!(
        log_format = ?config.log_format,
        filter = %config.default_filter,
        "Observability initialized"
    );
    Ok(())
}

/// Install only the Prometheus recorder (tracing already set up elsewhere)
pub fn init_metrics_only(port: u16) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus recorder")?;

    tracing::info!(port = port, "Prometheus metrics endpoint initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_mapping() {
        let filter = |v, q| {
            ObservabilityConfig::from_verbosity(LogFormat::Compact, v, q).default_filter
        };
        assert_eq!(filter(0, false), "info");
        assert_eq!(filter(1, false), "debug");
        assert_eq!(filter(3, false), "trace");
        assert_eq!(filter(2, true), "warn");

        let quiet = ObservabilityConfig::from_verbosity(LogFormat::Json, 0, true);
        assert!(!quiet.honour_env);
    }

    #[test]
    fn test_default_config() {
        let config = ObservabilityConfig::default();
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.metrics_port, None);
        assert!(config.honour_env);
    }
}
