//! Layered error definitions
//!
//! Categorized by source: config / channel / general

use thiserror::Error;

/// Unified error type shared by the configuration layer and output channels
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Channel Errors =====
    /// Output channel failed to deliver a message
    #[error("channel '{channel}' send error: {message}")]
    ChannelSend { channel: String, message: String },

    /// Output channel did not answer before the message deadline
    #[error("channel '{channel}' timed out after {waited_ms}ms")]
    ChannelTimeout { channel: String, waited_ms: u64 },

    /// Output channel no longer accepts messages
    #[error("channel '{channel}' is closed")]
    ChannelClosed { channel: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create channel send error
    pub fn channel_send(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ChannelSend {
            channel: channel.into(),
            message: message.into(),
        }
    }

    /// Create channel timeout error
    pub fn channel_timeout(channel: impl Into<String>, waited_ms: u64) -> Self {
        Self::ChannelTimeout {
            channel: channel.into(),
            waited_ms,
        }
    }

    /// Create channel closed error
    pub fn channel_closed(channel: impl Into<String>) -> Self {
        Self::ChannelClosed {
            channel: channel.into(),
        }
    }
}
