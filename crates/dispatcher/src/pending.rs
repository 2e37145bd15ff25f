//! PendingMessage - one queued unit of work

use std::time::{Duration, Instant};

use contracts::{ExpirationDate, MessageType};

use crate::handle::CompletionSlot;

/// A submitted message waiting in the type buffer.
///
/// Owned by the buffer until the worker pops it; after that only the
/// completion slot outlives the dispatch attempt.
#[derive(Debug)]
pub struct PendingMessage<M, T> {
    pub created_at: Instant,
    pub payload: M,
    pub message_type: MessageType,
    pub slot: CompletionSlot<T>,
    pub expiration: ExpirationDate,
}

impl<M, T> PendingMessage<M, T> {
    pub fn new(
        payload: M,
        message_type: MessageType,
        slot: CompletionSlot<T>,
        expiration: ExpirationDate,
    ) -> Self {
        Self {
            created_at: Instant::now(),
            payload,
            message_type,
            slot,
            expiration,
        }
    }

    /// Time spent since submission
    pub fn waited(&self) -> Duration {
        self.created_at.elapsed()
    }

    pub fn is_expired(&self) -> bool {
        self.expiration.is_expired()
    }
}
