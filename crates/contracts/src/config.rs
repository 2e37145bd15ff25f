//! Dispatcher configuration contracts that can be shared across crates.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::MessageType;

/// Largest sum of weights a dispatcher accepts.
///
/// The sum is the length of the recommender's sliding window, which is
/// allocated up front.
pub const MAX_WINDOW_CAPACITY: u32 = 1 << 20;

/// Dispatcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Dispatcher name (used for logging/metrics)
    #[serde(default = "default_name")]
    pub name: String,

    /// Registered message types and their priority weights
    pub registered_types: HashMap<MessageType, u32>,

    /// Longest the worker sleeps before re-checking buffer and capacity
    #[serde(default = "default_polling_interval_ms")]
    pub polling_interval_ms: u64,

    /// Ceiling on waiting for the worker during `close_and_wait`
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

fn default_name() -> String {
    "dispatcher".to_string()
}

fn default_polling_interval_ms() -> u64 {
    300
}

fn default_shutdown_timeout_ms() -> u64 {
    60_000
}

impl DispatcherConfig {
    /// Config with default timings for the given weights
    pub fn new(name: impl Into<String>, registered_types: HashMap<MessageType, u32>) -> Self {
        Self {
            name: name.into(),
            registered_types,
            polling_interval_ms: default_polling_interval_ms(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
        }
    }

    /// Build from `(type, weight)` pairs
    pub fn with_types<I, T>(name: impl Into<String>, types: I) -> Self
    where
        I: IntoIterator<Item = (T, u32)>,
        T: Into<MessageType>,
    {
        let registered_types = types.into_iter().map(|(t, w)| (t.into(), w)).collect();
        Self::new(name, registered_types)
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}
