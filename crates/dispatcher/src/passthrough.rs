//! Dispatchers that forward straight to the channel, without buffering.
//!
//! Useful in tests and for hosts that want the dispatcher surface without
//! prioritisation. Neither consults channel capacity.

use std::sync::Arc;

use contracts::{ExpirationDate, MessageType, OutputChannel, SendResult};
use tracing::trace;

use crate::dispatcher::MessageDispatcher;
use crate::error::DispatcherError;
use crate::handle::{Completion, CompletionSlot, DispatcherWaker};

/// Forward a message and resolve its completion from the channel's answer
fn forward<C: OutputChannel>(
    channel: &C,
    message: C::Message,
    expiration: ExpirationDate,
) -> Completion<C::Output> {
    let answer = match channel.send(message, expiration) {
        Ok(answer) => answer,
        Err(e) => return Completion::ready(Err(DispatcherError::send_failed(channel.name(), e))),
    };

    let (slot, completion) = CompletionSlot::new(DispatcherWaker::new());
    let name = channel.name().to_string();
    tokio::spawn(async move {
        let outcome = answer
            .await
            .map(SendResult::Sent)
            .map_err(|e| DispatcherError::send_failed(name, e));
        slot.complete(outcome);
    });
    completion
}

/// Sends every message immediately
#[derive(Debug)]
pub struct PassThroughDispatcher<C> {
    channel: Arc<C>,
}

impl<C: OutputChannel> PassThroughDispatcher<C> {
    pub fn new(channel: C) -> Self {
        Self {
            channel: Arc::new(channel),
        }
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }
}

impl<C: OutputChannel> MessageDispatcher for PassThroughDispatcher<C> {
    type Message = C::Message;
    type Output = C::Output;

    fn submit(
        &self,
        message: C::Message,
        message_type: MessageType,
        expiration: ExpirationDate,
    ) -> Result<Completion<C::Output>, DispatcherError> {
        trace!(message_type = %message_type, "Passing message through");
        Ok(forward(self.channel.as_ref(), message, expiration))
    }

    fn pending_count(&self) -> usize {
        0
    }

    fn wake(&self) {}

    fn request_drain(&self) {}

    fn request_force_shutdown(&self) {}

    async fn close_and_wait(&self) {}
}

/// Sends every message that has not yet expired; expired ones resolve
/// `NotSent` without reaching the channel
#[derive(Debug)]
pub struct ExpiringPassThroughDispatcher<C> {
    channel: Arc<C>,
}

impl<C: OutputChannel> ExpiringPassThroughDispatcher<C> {
    pub fn new(channel: C) -> Self {
        Self {
            channel: Arc::new(channel),
        }
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }
}

impl<C: OutputChannel> MessageDispatcher for ExpiringPassThroughDispatcher<C> {
    type Message = C::Message;
    type Output = C::Output;

    fn submit(
        &self,
        message: C::Message,
        message_type: MessageType,
        expiration: ExpirationDate,
    ) -> Result<Completion<C::Output>, DispatcherError> {
        if expiration.is_expired() {
            trace!(message_type = %message_type, "Message expired before forwarding");
            return Ok(Completion::ready(Ok(SendResult::NotSent)));
        }
        Ok(forward(self.channel.as_ref(), message, expiration))
    }

    fn pending_count(&self) -> usize {
        0
    }

    fn wake(&self) {}

    fn request_drain(&self) {}

    fn request_force_shutdown(&self) {}

    async fn close_and_wait(&self) {}
}
