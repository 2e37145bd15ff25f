//! Completion handles
//!
//! A [`CompletionSlot`] travels with a pending message and is resolved exactly
//! once; the producer awaits the paired [`Completion`]. Every resolution pokes
//! the dispatcher's waker so the worker re-checks buffer and capacity.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use contracts::SendResult;
use tokio::sync::{oneshot, Notify};

use crate::error::DispatcherError;

/// What a producer eventually receives for a submitted message
pub type Outcome<T> = Result<SendResult<T>, DispatcherError>;

/// Wake signal shared between a dispatcher worker and whoever can free
/// output capacity.
///
/// Backed by [`Notify::notify_one`], so a wake delivered while the worker is
/// busy is kept and consumed by its next wait.
#[derive(Debug, Clone, Default)]
pub struct DispatcherWaker(Arc<Notify>);

impl DispatcherWaker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal that the worker should re-check buffer and capacity
    pub fn wake(&self) {
        self.0.notify_one();
    }

    pub(crate) async fn notified(&self) {
        self.0.notified().await
    }
}

/// Single-assignment producer side of a [`Completion`].
///
/// Dropping a slot without completing it resolves the completion with
/// `NotSentShuttingDown`.
#[derive(Debug)]
pub struct CompletionSlot<T> {
    tx: Option<oneshot::Sender<Outcome<T>>>,
    waker: DispatcherWaker,
}

impl<T> CompletionSlot<T> {
    /// Create a slot and the completion it resolves
    pub fn new(waker: DispatcherWaker) -> (Self, Completion<T>) {
        let (tx, rx) = oneshot::channel();
        let slot = Self {
            tx: Some(tx),
            waker,
        };
        (slot, Completion::pending(rx))
    }

    /// Resolve the completion and wake the worker.
    ///
    /// Returns `false` if the producer already dropped its [`Completion`].
    pub fn complete(mut self, outcome: Outcome<T>) -> bool {
        self.resolve(outcome)
    }

    fn resolve(&mut self, outcome: Outcome<T>) -> bool {
        let Some(tx) = self.tx.take() else {
            return false;
        };
        let delivered = tx.send(outcome).is_ok();
        self.waker.wake();
        delivered
    }
}

impl<T> Drop for CompletionSlot<T> {
    fn drop(&mut self) {
        self.resolve(Ok(SendResult::NotSentShuttingDown));
    }
}

/// Future resolving to the outcome of a submitted message
#[derive(Debug)]
#[must_use = "a completion does nothing unless awaited"]
pub struct Completion<T> {
    inner: Inner<T>,
}

#[derive(Debug)]
enum Inner<T> {
    Ready(Option<Outcome<T>>),
    Pending(oneshot::Receiver<Outcome<T>>),
}

impl<T> Completion<T> {
    /// Completion that is already resolved
    pub fn ready(outcome: Outcome<T>) -> Self {
        Self {
            inner: Inner::Ready(Some(outcome)),
        }
    }

    fn pending(rx: oneshot::Receiver<Outcome<T>>) -> Self {
        Self {
            inner: Inner::Pending(rx),
        }
    }
}

// No field is ever pinned.
impl<T> Unpin for Completion<T> {}

impl<T> Future for Completion<T> {
    type Output = Outcome<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().inner {
            Inner::Ready(outcome) => {
                Poll::Ready(outcome.take().unwrap_or(Err(DispatcherError::Abandoned)))
            }
            Inner::Pending(rx) => Pin::new(rx)
                .poll(cx)
                .map(|received| received.unwrap_or(Err(DispatcherError::Abandoned))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::SendStatus;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_complete_resolves_completion() {
        let (slot, completion) = CompletionSlot::new(DispatcherWaker::new());
        assert!(slot.complete(Ok(SendResult::Sent(7))));

        let outcome = completion.await.unwrap();
        assert_eq!(outcome, SendResult::Sent(7));
    }

    #[tokio::test]
    async fn test_dropped_slot_resolves_shutting_down() {
        let (slot, completion) = CompletionSlot::<u32>::new(DispatcherWaker::new());
        drop(slot);

        let outcome = completion.await.unwrap();
        assert_eq!(outcome.status(), SendStatus::NotSentShuttingDown);
    }

    #[tokio::test]
    async fn test_complete_wakes_waiter() {
        let waker = DispatcherWaker::new();
        let (slot, _completion) = CompletionSlot::<()>::new(waker.clone());

        slot.complete(Ok(SendResult::NotSent));

        // The permit stored by `complete` is consumed immediately.
        timeout(Duration::from_millis(100), waker.notified())
            .await
            .expect("wake signal was lost");
    }

    #[tokio::test]
    async fn test_complete_after_receiver_dropped() {
        let (slot, completion) = CompletionSlot::<()>::new(DispatcherWaker::new());
        drop(completion);
        assert!(!slot.complete(Ok(SendResult::NotSent)));
    }

    #[tokio::test]
    async fn test_ready_completion() {
        let completion: Completion<()> = Completion::ready(Ok(SendResult::NotSentShuttingDown));
        assert_eq!(completion.await.unwrap(), SendResult::NotSentShuttingDown);
    }
}
