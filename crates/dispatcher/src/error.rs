//! Dispatcher error types

use contracts::{ContractError, MessageType};
use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Invalid registered types or timings; the dispatcher never starts
    #[error("invalid dispatcher configuration: {0}")]
    Config(String),

    /// Submission of a type the dispatcher was not configured with
    #[error("message type '{message_type}' is not registered")]
    UnregisteredType {
        message_type: MessageType,
        registered: Vec<MessageType>,
    },

    /// Output channel raised, or its pending answer failed
    #[error("send through channel '{channel}' failed")]
    SendFailed {
        channel: String,
        source: ContractError,
    },

    /// Buffer is non-empty but no registered type yielded a message
    #[error("buffer holds {size} message(s) but no registered type yielded one")]
    NoRecommendedMessage { size: usize },

    /// Completion slot vanished without a result
    #[error("completion slot dropped without a result")]
    Abandoned,

    #[error("contract error: {0}")]
    Contract(#[from] ContractError),
}

impl DispatcherError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a send failure wrapping the channel's error
    pub fn send_failed(channel: impl Into<String>, source: ContractError) -> Self {
        Self::SendFailed {
            channel: channel.into(),
            source,
        }
    }

    pub fn is_send_failure(&self) -> bool {
        matches!(self, Self::SendFailed { .. })
    }
}
