//! # Dispatcher
//!
//! Priority-aware message dispatcher in front of a capacity-limited output
//! channel.
//!
//! Responsibilities:
//! - Buffer submitted messages per type
//! - Pick the next type with a weighted-fair recommender
//! - Respect channel backpressure and message deadlines
//! - Drain or abandon buffered work on shutdown

pub mod buffer;
pub mod channels;
pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod passthrough;
pub mod pending;
pub mod recommender;
pub mod state;
mod worker;

pub use channels::{DeliveryReceipt, LimitedChannel, LogHandler};
pub use contracts::{ExpirationDate, MessageType, OutputChannel, SendResult, SendStatus};
pub use dispatcher::{LocalMessageDispatcher, MessageDispatcher, PriorityDispatcher};
pub use error::DispatcherError;
pub use handle::{Completion, CompletionSlot, DispatcherWaker, Outcome};
pub use metrics::{DispatcherMetrics, MetricsSnapshot};
pub use passthrough::{ExpiringPassThroughDispatcher, PassThroughDispatcher};
pub use recommender::{ExpectedSpread, PriorityRecommender};
pub use state::DispatcherState;
