//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::DispatcherConfig;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    name: String,
    type_count: usize,
    window_capacity: u64,
    polling_interval_ms: u64,
    shutdown_timeout_ms: u64,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary {
                    name: config.name.clone(),
                    type_count: config.registered_types.len(),
                    window_capacity: config.registered_types.values().map(|w| *w as u64).sum(),
                    polling_interval_ms: config.polling_interval_ms,
                    shutdown_timeout_ms: config.shutdown_timeout_ms,
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &DispatcherConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.registered_types.len() == 1 {
        warnings.push("Only one message type registered - no prioritisation happens".to_string());
    }

    let mut weights: Vec<u32> = config.registered_types.values().copied().collect();
    weights.sort_unstable();
    if weights.windows(2).any(|w| w[0] == w[1]) {
        warnings.push("Some types share a weight - ties are ordered by type name".to_string());
    }

    if config.polling_interval_ms > config.shutdown_timeout_ms {
        warnings.push(format!(
            "polling_interval_ms ({}) exceeds shutdown_timeout_ms ({})",
            config.polling_interval_ms, config.shutdown_timeout_ms
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Name: {}", summary.name);
            println!("  Message types: {}", summary.type_count);
            println!("  Window capacity: {}", summary.window_capacity);
            println!("  Polling interval: {}ms", summary.polling_interval_ms);
            println!("  Shutdown timeout: {}ms", summary.shutdown_timeout_ms);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_valid_config() {
        let file = write_config("name = \"n\"\n[registered_types]\nhigh = 10\nlow = 1\n");
        let args = ValidateArgs {
            config: file.path().to_path_buf(),
            json: true,
        };

        let result = validate_config(&args);
        assert!(result.valid);
        assert_eq!(result.summary.unwrap().window_capacity, 11);
        assert!(result.warnings.is_none());
    }

    #[test]
    fn test_invalid_config_reports_error() {
        let file = write_config("[registered_types]\nhigh = 0\n");
        let args = ValidateArgs {
            config: file.path().to_path_buf(),
            json: false,
        };

        let result = validate_config(&args);
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("registered_types.high"));
        assert!(run_validate(&args).is_err());
    }

    #[test]
    fn test_warnings() {
        let mut config = DispatcherConfig::with_types("w", [("a", 2), ("b", 2)]);
        config.polling_interval_ms = 100_000;

        let warnings = collect_warnings(&config);
        assert_eq!(warnings.len(), 2);
    }
}
