//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the workspace.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Deadlines are absolute wall-clock instants (`chrono::DateTime<Utc>`)
//! - Expiry is checked lazily by whoever holds the deadline

mod channel;
mod config;
mod error;
mod expiration;
mod message_type;
mod result;

pub use channel::{LocalMessageHandler, MessageHandler, OutputChannel, SendFuture};
pub use config::{DispatcherConfig, MAX_WINDOW_CAPACITY};
pub use error::ContractError;
pub use expiration::{ExpirationDate, SLIP_TIME_MS};
pub use message_type::MessageType;
pub use result::{SendResult, SendStatus};
