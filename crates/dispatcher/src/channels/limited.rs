//! LimitedChannel - bounds the number of in-flight handler calls

use std::sync::Arc;

use contracts::{ContractError, ExpirationDate, MessageHandler, OutputChannel, SendFuture};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::trace;

use crate::handle::DispatcherWaker;

/// Output channel allowing at most `max_in_flight` concurrent handler calls.
///
/// A slot is reserved synchronously in `send` and released when the handler
/// answers or times out. The handler receives the slip-time-deducted deadline
/// and is cut off when that deadline passes.
pub struct LimitedChannel<H> {
    name: String,
    handler: Arc<H>,
    slots: Arc<Semaphore>,
    max_in_flight: usize,
    waker: Option<DispatcherWaker>,
}

impl<H> std::fmt::Debug for LimitedChannel<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LimitedChannel")
            .field("name", &self.name)
            .field("in_flight", &self.in_flight())
            .field("max_in_flight", &self.max_in_flight)
            .finish()
    }
}

impl<H> LimitedChannel<H>
where
    H: MessageHandler + Send + Sync + 'static,
    H::Message: Send + 'static,
    H::Output: Send + 'static,
{
    /// Wrap `handler`; `max_in_flight` is raised to at least 1
    pub fn new(handler: H, max_in_flight: usize) -> Self {
        let max_in_flight = max_in_flight.max(1);
        Self {
            name: handler.name().to_string(),
            handler: Arc::new(handler),
            slots: Arc::new(Semaphore::new(max_in_flight)),
            max_in_flight,
            waker: None,
        }
    }

    /// Wake `waker` whenever a slot is released
    pub fn with_waker(mut self, waker: DispatcherWaker) -> Self {
        self.waker = Some(waker);
        self
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }
}

impl<H> LimitedChannel<H> {
    /// Handler calls currently running
    pub fn in_flight(&self) -> usize {
        self.max_in_flight
            .saturating_sub(self.slots.available_permits())
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }
}

/// Reserved slot; releasing it wakes the dispatcher
struct Slot {
    permit: Option<OwnedSemaphorePermit>,
    waker: Option<DispatcherWaker>,
}

impl Drop for Slot {
    fn drop(&mut self) {
        // Capacity must be visible before the worker is woken
        drop(self.permit.take());
        if let Some(waker) = &self.waker {
            waker.wake();
        }
    }
}

impl<H> OutputChannel for LimitedChannel<H>
where
    H: MessageHandler + Send + Sync + 'static,
    H::Message: Send + 'static,
    H::Output: Send + 'static,
{
    type Message = H::Message;
    type Output = H::Output;

    fn name(&self) -> &str {
        &self.name
    }

    fn send(
        &self,
        message: H::Message,
        expiration: ExpirationDate,
    ) -> Result<SendFuture<H::Output>, ContractError> {
        let permit = Arc::clone(&self.slots)
            .try_acquire_owned()
            .map_err(|_| ContractError::channel_send(&self.name, "no free slot"))?;
        let slot = Slot {
            permit: Some(permit),
            waker: self.waker.clone(),
        };

        let handler = Arc::clone(&self.handler);
        let name = self.name.clone();
        let deadline = expiration.deduct_slip_time();
        trace!(channel = %name, in_flight = self.in_flight(), "Slot reserved");

        Ok(Box::pin(async move {
            let _slot = slot;
            let Some(budget) = deadline.remaining() else {
                return Err(ContractError::channel_timeout(name, 0));
            };
            match tokio::time::timeout(budget, handler.handle(message, deadline)).await {
                Ok(answer) => answer,
                Err(_) => Err(ContractError::channel_timeout(
                    name,
                    budget.as_millis() as u64,
                )),
            }
        }))
    }

    fn has_capacity(&self) -> bool {
        self.slots.available_permits() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Notify;
    use tokio::time::timeout;

    /// Handler that blocks until released and records the deadlines it saw
    #[derive(Default)]
    struct GateHandler {
        gate: Notify,
        seen: Mutex<Vec<ExpirationDate>>,
    }

    impl MessageHandler for GateHandler {
        type Message = u32;
        type Output = u32;

        fn name(&self) -> &str {
            "gate"
        }

        async fn handle(
            &self,
            message: u32,
            expiration: ExpirationDate,
        ) -> Result<u32, ContractError> {
            self.seen.lock().unwrap().push(expiration);
            self.gate.notified().await;
            Ok(message)
        }
    }

    #[tokio::test]
    async fn test_capacity_accounting() {
        let channel = LimitedChannel::new(GateHandler::default(), 2);
        let expiration = ExpirationDate::expires_in_ms(10_000);

        assert!(channel.has_capacity());
        let first = tokio::spawn(channel.send(1, expiration).unwrap());
        let second = tokio::spawn(channel.send(2, expiration).unwrap());
        assert_eq!(channel.in_flight(), 2);
        assert!(!channel.has_capacity());

        // Third send raises synchronously
        let err = channel.send(3, expiration).err().unwrap();
        assert!(matches!(err, ContractError::ChannelSend { .. }));

        // Let both handlers reach the gate, then release them
        tokio::task::yield_now().await;
        while channel.handler().seen.lock().unwrap().len() < 2 {
            tokio::task::yield_now().await;
        }
        channel.handler().gate.notify_waiters();

        assert_eq!(first.await.unwrap().unwrap(), 1);
        assert_eq!(second.await.unwrap().unwrap(), 2);
        assert_eq!(channel.in_flight(), 0);
        assert!(channel.has_capacity());
    }

    #[tokio::test]
    async fn test_handler_gets_slipped_deadline() {
        let channel = LimitedChannel::new(GateHandler::default(), 1);
        let expiration = ExpirationDate::expires_in_ms(10_000);

        let answer = tokio::spawn(channel.send(7, expiration).unwrap());
        while channel.handler().seen.lock().unwrap().is_empty() {
            tokio::task::yield_now().await;
        }
        channel.handler().gate.notify_waiters();
        answer.await.unwrap().unwrap();

        let seen = channel.handler().seen.lock().unwrap()[0];
        assert_eq!(seen, expiration.deduct_slip_time());
    }

    #[tokio::test]
    async fn test_timeout_releases_slot_and_wakes() {
        let waker = DispatcherWaker::new();
        let channel = LimitedChannel::new(GateHandler::default(), 1).with_waker(waker.clone());

        // Slip time leaves roughly 30ms of budget
        let expiration = ExpirationDate::expires_in_ms(80);
        let err = channel.send(1, expiration).unwrap().await.unwrap_err();

        assert!(matches!(err, ContractError::ChannelTimeout { .. }));
        assert!(channel.has_capacity());
        timeout(Duration::from_millis(100), waker.notified())
            .await
            .expect("slot release did not wake");
    }

    #[tokio::test]
    async fn test_already_expired_deadline_times_out() {
        let channel = LimitedChannel::new(GateHandler::default(), 1);

        let err = channel
            .send(1, ExpirationDate::expires_in_ms(10))
            .unwrap()
            .await
            .unwrap_err();

        assert!(matches!(err, ContractError::ChannelTimeout { waited_ms: 0, .. }));
        assert!(channel.handler().seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_zero_limit_raised_to_one() {
        let channel = LimitedChannel::new(GateHandler::default(), 0);
        assert_eq!(channel.max_in_flight(), 1);
    }
}
