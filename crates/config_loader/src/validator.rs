//! Configuration validation
//!
//! Rules:
//! - name is non-empty
//! - at least one registered type
//! - type names are non-empty
//! - every weight > 0 and the weight sum is at most MAX_WINDOW_CAPACITY
//! - polling_interval_ms > 0, shutdown_timeout_ms > 0

use contracts::{ContractError, DispatcherConfig, MAX_WINDOW_CAPACITY};

/// Validate a DispatcherConfig
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(config: &DispatcherConfig) -> Result<(), ContractError> {
    validate_name(config)?;
    validate_registered_types(config)?;
    validate_timings(config)?;
    Ok(())
}

fn validate_name(config: &DispatcherConfig) -> Result<(), ContractError> {
    if config.name.trim().is_empty() {
        return Err(ContractError::config_validation(
            "name",
            "dispatcher name cannot be empty",
        ));
    }
    Ok(())
}

fn validate_registered_types(config: &DispatcherConfig) -> Result<(), ContractError> {
    if config.registered_types.is_empty() {
        return Err(ContractError::config_validation(
            "registered_types",
            "at least one message type must be registered",
        ));
    }

    let mut total: u32 = 0;
    for (message_type, weight) in &config.registered_types {
        if message_type.trim().is_empty() {
            return Err(ContractError::config_validation(
                "registered_types",
                "message type name cannot be empty",
            ));
        }
        if *weight == 0 {
            return Err(ContractError::config_validation(
                format!("registered_types.{message_type}"),
                "weight must be > 0",
            ));
        }
        total = total.checked_add(*weight).ok_or_else(|| {
            ContractError::config_validation(
                "registered_types",
                "sum of weights overflows the statistics window",
            )
        })?;
    }
    if total > MAX_WINDOW_CAPACITY {
        return Err(ContractError::config_validation(
            "registered_types",
            format!(
                "sum of weights {total} exceeds the maximum window capacity {MAX_WINDOW_CAPACITY}"
            ),
        ));
    }
    Ok(())
}

fn validate_timings(config: &DispatcherConfig) -> Result<(), ContractError> {
    if config.polling_interval_ms == 0 {
        return Err(ContractError::config_validation(
            "polling_interval_ms",
            "polling_interval_ms must be > 0",
        ));
    }
    if config.shutdown_timeout_ms == 0 {
        return Err(ContractError::config_validation(
            "shutdown_timeout_ms",
            "shutdown_timeout_ms must be > 0",
        ));
    }
    Ok(())
}
