//! Synthetic load for exercising a dispatcher.

mod generator;
mod stats;

pub use generator::{LoadConfig, LoadGenerator, ShutdownMode};
pub use stats::RunStats;
