//! Type buffer - per-type FIFO queues shared by producers and the worker
//!
//! - Producers push from any task
//! - The worker pops by type in recommendation order
//! - Forced shutdown drains everything through a visitor

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use contracts::MessageType;
use tracing::warn;

use crate::error::DispatcherError;
use crate::pending::PendingMessage;

type Queues<M, T> = HashMap<MessageType, VecDeque<PendingMessage<M, T>>>;

/// Multi-queue keyed by message type.
///
/// An empty queue is equivalent to an absent key.
pub struct TypeBuffer<M, T> {
    queues: Mutex<Queues<M, T>>,
}

impl<M, T> std::fmt::Debug for TypeBuffer<M, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeBuffer")
            .field("size", &self.size())
            .finish_non_exhaustive()
    }
}

impl<M, T> Default for TypeBuffer<M, T> {
    fn default() -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
        }
    }
}

impl<M, T> TypeBuffer<M, T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A panicking holder cannot leave the queues half-updated, so a poisoned
    /// lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, Queues<M, T>> {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append to the queue of `message.message_type`
    pub fn push(&self, message: PendingMessage<M, T>) {
        self.lock()
            .entry(message.message_type.clone())
            .or_default()
            .push_back(message);
    }

    /// Oldest message of `message_type`, if any
    pub fn pop_next(&self, message_type: &MessageType) -> Option<PendingMessage<M, T>> {
        self.lock().get_mut(message_type)?.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().values().all(VecDeque::is_empty)
    }

    /// Total messages across all types
    pub fn size(&self) -> usize {
        self.lock().values().map(VecDeque::len).sum()
    }

    pub fn has_any(&self, message_type: &MessageType) -> bool {
        self.lock()
            .get(message_type)
            .is_some_and(|queue| !queue.is_empty())
    }

    /// Remove every buffered message and hand each one to `visit`.
    ///
    /// Queues are taken under the lock and visited after it is released, so
    /// `visit` may resolve completions freely. A failing visit is logged and
    /// draining continues. Returns the number of messages removed.
    pub fn drain_all<F>(&self, mut visit: F) -> usize
    where
        F: FnMut(PendingMessage<M, T>) -> Result<(), DispatcherError>,
    {
        let taken = std::mem::take(&mut *self.lock());

        let mut drained = 0;
        for (message_type, queue) in taken {
            for message in queue {
                drained += 1;
                if let Err(e) = visit(message) {
                    warn!(
                        message_type = %message_type,
                        error = %e,
                        "Failed to process drained message"
                    );
                }
            }
        }
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::{Completion, CompletionSlot, DispatcherWaker};
    use contracts::{ExpirationDate, SendResult};

    fn message(
        payload: u32,
        message_type: &str,
    ) -> (PendingMessage<u32, ()>, Completion<()>) {
        let (slot, completion) = CompletionSlot::new(DispatcherWaker::new());
        let pending = PendingMessage::new(
            payload,
            message_type.into(),
            slot,
            ExpirationDate::expires_in_ms(60_000),
        );
        (pending, completion)
    }

    #[test]
    fn test_fifo_per_type() {
        let buffer = TypeBuffer::new();
        for i in 0..3 {
            buffer.push(message(i, "high").0);
            buffer.push(message(100 + i, "low").0);
        }

        let high: MessageType = "high".into();
        let low: MessageType = "low".into();

        assert_eq!(buffer.pop_next(&high).map(|m| m.payload), Some(0));
        assert_eq!(buffer.pop_next(&low).map(|m| m.payload), Some(100));
        assert_eq!(buffer.pop_next(&high).map(|m| m.payload), Some(1));
        assert_eq!(buffer.pop_next(&high).map(|m| m.payload), Some(2));
        assert!(buffer.pop_next(&high).is_none());
        assert!(!buffer.has_any(&high));
        assert!(buffer.has_any(&low));
    }

    #[test]
    fn test_size_and_emptiness() {
        let buffer = TypeBuffer::new();
        assert!(buffer.is_empty());
        assert_eq!(buffer.size(), 0);

        buffer.push(message(1, "a").0);
        buffer.push(message(2, "b").0);
        buffer.push(message(3, "b").0);
        assert_eq!(buffer.size(), 3);

        buffer.pop_next(&"a".into());
        assert_eq!(buffer.size(), 2);
        assert!(!buffer.is_empty());

        // Emptied queue behaves like an absent key
        assert!(!buffer.has_any(&"a".into()));
        assert!(buffer.pop_next(&"missing".into()).is_none());
    }

    #[tokio::test]
    async fn test_drain_all_continues_after_failure() {
        let buffer = TypeBuffer::new();
        let mut completions = Vec::new();
        for i in 0..5 {
            let (pending, completion) = message(i, if i % 2 == 0 { "even" } else { "odd" });
            buffer.push(pending);
            completions.push(completion);
        }

        let mut visited = Vec::new();
        let drained = buffer.drain_all(|pending| {
            visited.push(pending.payload);
            if pending.payload == 2 {
                return Err(DispatcherError::Abandoned);
            }
            pending.slot.complete(Ok(SendResult::NotSentShuttingDown));
            Ok(())
        });

        assert_eq!(drained, 5);
        visited.sort_unstable();
        assert_eq!(visited, vec![0, 1, 2, 3, 4]);
        assert!(buffer.is_empty());

        // Even the failed visit resolves its completion when the slot drops
        for completion in completions {
            assert_eq!(
                completion.await.unwrap(),
                SendResult::NotSentShuttingDown
            );
        }
    }

    #[test]
    fn test_concurrent_push_loses_nothing() {
        let buffer = std::sync::Arc::new(TypeBuffer::<u32, ()>::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let buffer = std::sync::Arc::clone(&buffer);
                std::thread::spawn(move || {
                    for i in 0..250 {
                        let (pending, _completion) = message(t * 1000 + i, "shared");
                        buffer.push(pending);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(buffer.size(), 1000);
    }
}
