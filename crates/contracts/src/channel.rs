//! Output channel contracts
//!
//! The dispatcher only needs two things from its downstream: an asynchronous
//! send and a capacity predicate it can poll.

use std::future::Future;
use std::pin::Pin;

use crate::{ContractError, ExpirationDate};

/// Pending answer of an output channel send.
pub type SendFuture<T> = Pin<Box<dyn Future<Output = Result<T, ContractError>> + Send + 'static>>;

/// Capacity-limited downstream fed by a dispatcher.
///
/// `send` runs on the dispatch worker. Its synchronous part should only
/// reserve resources and build the future; the returned future is awaited
/// elsewhere so the worker can keep going.
pub trait OutputChannel: Send + Sync + 'static {
    /// Payload accepted by the channel
    type Message: Send + 'static;
    /// Answer produced by a successful send
    type Output: Send + 'static;

    /// Channel name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Start sending `message`.
    ///
    /// # Errors
    /// An `Err` here is a synchronous failure; a failure of the returned
    /// future is an asynchronous one. Both fail only this message.
    fn send(
        &self,
        message: Self::Message,
        expiration: ExpirationDate,
    ) -> Result<SendFuture<Self::Output>, ContractError>;

    /// Whether another send may be started now
    fn has_capacity(&self) -> bool;
}

/// Asynchronous downstream transport.
///
/// Built-in channels adapt a handler into an [`OutputChannel`].
#[trait_variant::make(MessageHandler: Send)]
pub trait LocalMessageHandler {
    /// Payload accepted by the handler
    type Message;
    /// Answer produced on success
    type Output;

    /// Handler name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Deliver one message before `expiration`
    ///
    /// # Errors
    /// Returns delivery error (should include context)
    async fn handle(
        &self,
        message: Self::Message,
        expiration: ExpirationDate,
    ) -> Result<Self::Output, ContractError>;
}
