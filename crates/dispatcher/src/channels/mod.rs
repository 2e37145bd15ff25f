//! Built-in output channels and handlers

mod limited;
mod log;

pub use limited::LimitedChannel;
pub use log::{DeliveryReceipt, LogHandler};
