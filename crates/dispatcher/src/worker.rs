//! Dispatch worker - the single task that drives the send loop

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use contracts::{OutputChannel, SendResult};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::buffer::TypeBuffer;
use crate::error::DispatcherError;
use crate::handle::DispatcherWaker;
use crate::metrics::DispatcherMetrics;
use crate::pending::PendingMessage;
use crate::recommender::PriorityRecommender;
use crate::state::{AtomicState, DispatcherState};

/// State shared between the facade and the worker
pub(crate) struct Shared<M, T> {
    pub(crate) name: String,
    pub(crate) state: AtomicState,
    pub(crate) buffer: TypeBuffer<M, T>,
    pub(crate) waker: DispatcherWaker,
    pub(crate) metrics: Arc<DispatcherMetrics>,
    /// Set once the worker stopped draining; late pushes drain themselves
    terminated: AtomicBool,
}

impl<M, T> Shared<M, T> {
    pub(crate) fn new(name: String, waker: DispatcherWaker) -> Self {
        let metrics = Arc::new(DispatcherMetrics::new(name.clone()));
        Self {
            name,
            state: AtomicState::new(),
            buffer: TypeBuffer::new(),
            waker,
            metrics,
            terminated: AtomicBool::new(false),
        }
    }

    pub(crate) fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    /// Mark the worker gone and abandon whatever is still buffered
    pub(crate) fn terminate(&self) {
        self.terminated.store(true, Ordering::SeqCst);
        self.abandon_buffered();
    }

    /// Resolve every buffered message `NotSentShuttingDown`.
    ///
    /// Repeats until the buffer reads empty so a push racing the drain is
    /// not left behind.
    pub(crate) fn abandon_buffered(&self) -> usize {
        let mut total = 0;
        loop {
            let drained = self.buffer.drain_all(|pending| {
                pending.slot.complete(Ok(SendResult::NotSentShuttingDown));
                Ok(())
            });
            if drained == 0 {
                break;
            }
            total += drained;
        }
        if total > 0 {
            self.metrics.add_force_completed(total);
            self.metrics.set_buffer_size(self.buffer.size());
            info!(dispatcher = %self.name, abandoned = total, "Abandoned buffered messages");
        }
        total
    }
}

/// Worker owning the recommender and driving dispatch
pub(crate) struct Worker<C: OutputChannel> {
    shared: Arc<Shared<C::Message, C::Output>>,
    channel: Arc<C>,
    recommender: PriorityRecommender,
    polling_interval: Duration,
}

impl<C: OutputChannel> Worker<C> {
    pub(crate) fn new(
        shared: Arc<Shared<C::Message, C::Output>>,
        channel: Arc<C>,
        recommender: PriorityRecommender,
        polling_interval: Duration,
    ) -> Self {
        Self {
            shared,
            channel,
            recommender,
            polling_interval,
        }
    }

    /// Run until a shutdown completes
    #[instrument(
        name = "dispatch_worker_loop",
        skip(self),
        fields(dispatcher = %self.shared.name)
    )]
    pub(crate) async fn run(mut self) {
        debug!("Dispatch worker started");

        loop {
            let state = self.shared.state.load();
            match state {
                DispatcherState::Active => {
                    if self.dispatch_available().await {
                        self.wait().await;
                    }
                }
                DispatcherState::Draining => {
                    let ok = self.dispatch_available().await;
                    if self.shared.buffer.is_empty() {
                        break;
                    }
                    if ok {
                        self.wait().await;
                    }
                }
                DispatcherState::ForceShutdown => {
                    self.shared.abandon_buffered();
                    break;
                }
            }
        }

        self.shared.terminate();
        info!(state = %self.shared.state.load(), "Dispatch worker stopped");
    }

    /// Dispatch while the buffer is non-empty and the channel has capacity.
    ///
    /// Returns `false` after an invariant violation; the cycle is then
    /// skipped and the worker has already backed off for one poll interval.
    async fn dispatch_available(&mut self) -> bool {
        while !self.shared.buffer.is_empty()
            && self.shared.state.load() != DispatcherState::ForceShutdown
            && self.channel.has_capacity()
        {
            if let Err(e) = self.dispatch_one() {
                error!(error = %e, "Dispatch cycle failed");
                tokio::time::sleep(self.polling_interval).await;
                return false;
            }
        }
        true
    }

    /// Block until woken or the poll interval passes
    async fn wait(&self) {
        let _ = tokio::time::timeout(self.polling_interval, self.shared.waker.notified()).await;
    }

    /// Pop the most deserving message and hand it to the channel
    fn dispatch_one(&mut self) -> Result<(), DispatcherError> {
        if self.shared.buffer.is_empty() {
            return Ok(());
        }

        let pending = self.pop_recommended().ok_or_else(|| {
            DispatcherError::NoRecommendedMessage {
                size: self.shared.buffer.size(),
            }
        })?;

        let metrics = &self.shared.metrics;
        metrics.set_buffer_size(self.shared.buffer.size());
        metrics.observe_buffer_wait(
            &pending.message_type,
            pending.waited().as_secs_f64() * 1000.0,
        );

        if pending.is_expired() {
            warn!(
                message_type = %pending.message_type,
                expiration = %pending.expiration,
                "Message expired in buffer"
            );
            metrics.inc_expired(&pending.message_type);
            pending.slot.complete(Ok(SendResult::NotSent));
            return Ok(());
        }

        self.recommender.record(pending.message_type.clone());
        self.send(pending);
        Ok(())
    }

    fn pop_recommended(&self) -> Option<PendingMessage<C::Message, C::Output>> {
        self.recommender
            .recommend()
            .iter()
            .find_map(|t| self.shared.buffer.pop_next(t))
    }

    fn send(&self, pending: PendingMessage<C::Message, C::Output>) {
        let PendingMessage {
            payload,
            message_type,
            slot,
            expiration,
            ..
        } = pending;

        trace!(message_type = %message_type, "Sending message");

        match self.channel.send(payload, expiration) {
            Ok(answer) => {
                let metrics = Arc::clone(&self.shared.metrics);
                let channel = self.channel.name().to_string();
                tokio::spawn(async move {
                    match answer.await {
                        Ok(value) => {
                            metrics.inc_sent();
                            slot.complete(Ok(SendResult::Sent(value)));
                        }
                        Err(e) => {
                            metrics.inc_send_failed();
                            error!(
                                channel = %channel,
                                message_type = %message_type,
                                error = %e,
                                "Send failed"
                            );
                            slot.complete(Err(DispatcherError::send_failed(channel, e)));
                        }
                    }
                });
            }
            Err(e) => {
                self.shared.metrics.inc_send_failed();
                error!(
                    channel = %self.channel.name(),
                    message_type = %message_type,
                    error = %e,
                    "Send raised"
                );
                slot.complete(Err(DispatcherError::send_failed(self.channel.name(), e)));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::{Completion, CompletionSlot};
    use contracts::{ContractError, ExpirationDate, MessageType, SendFuture};
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use tokio::time::{sleep, timeout};
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::Layer;

    const WAIT: Duration = Duration::from_secs(5);

    struct AckChannel;

    impl OutputChannel for AckChannel {
        type Message = String;
        type Output = String;

        fn name(&self) -> &str {
            "ack"
        }

        fn send(
            &self,
            message: String,
            _expiration: ExpirationDate,
        ) -> Result<SendFuture<String>, ContractError> {
            Ok(Box::pin(async move { Ok(format!("ack:{message}")) }))
        }

        fn has_capacity(&self) -> bool {
            true
        }
    }

    /// Counts error-level events
    struct ErrorCounter(Arc<AtomicUsize>);

    impl<S: Subscriber> Layer<S> for ErrorCounter {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == Level::ERROR {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn push(
        shared: &Shared<String, String>,
        payload: &str,
        message_type: &str,
    ) -> Completion<String> {
        let (slot, completion) = CompletionSlot::new(shared.waker.clone());
        shared.buffer.push(PendingMessage::new(
            payload.to_string(),
            MessageType::new(message_type),
            slot,
            ExpirationDate::expires_in_ms(60_000),
        ));
        shared.waker.wake();
        completion
    }

    #[tokio::test]
    async fn test_unrecommendable_message_skips_cycle_and_keeps_running() {
        let errors = Arc::new(AtomicUsize::new(0));
        let _guard = tracing_subscriber::registry()
            .with(ErrorCounter(Arc::clone(&errors)))
            .set_default();

        let weights: HashMap<MessageType, u32> = [(MessageType::new("high"), 1)].into();
        let shared = Arc::new(Shared::new("worker-test".to_string(), DispatcherWaker::new()));
        let worker = Worker::new(
            Arc::clone(&shared),
            Arc::new(AckChannel),
            PriorityRecommender::new(&weights).unwrap(),
            Duration::from_millis(10),
        );

        // Bypasses submit's registration check
        let ghost = push(&shared, "ghost", "unregistered");
        let handle = tokio::spawn(worker.run());

        timeout(WAIT, async {
            while errors.load(Ordering::SeqCst) == 0 {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("invariant violation was not logged");
        assert!(!shared.is_terminated());
        assert_eq!(shared.buffer.size(), 1);

        let outcome = timeout(WAIT, push(&shared, "real", "high"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome, SendResult::Sent("ack:real".to_string()));
        assert!(!shared.is_terminated());

        shared.state.advance(DispatcherState::ForceShutdown);
        shared.waker.wake();
        timeout(WAIT, handle).await.unwrap().unwrap();

        let outcome = timeout(WAIT, ghost).await.unwrap().unwrap();
        assert_eq!(outcome, SendResult::NotSentShuttingDown);
        assert!(shared.is_terminated());
    }
}
