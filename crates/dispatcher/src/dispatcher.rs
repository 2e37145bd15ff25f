//! PriorityDispatcher - public entry point wiring buffer, recommender and worker

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use contracts::{DispatcherConfig, ExpirationDate, MessageType, OutputChannel, SendResult};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::error::DispatcherError;
use crate::handle::{Completion, CompletionSlot, DispatcherWaker};
use crate::metrics::DispatcherMetrics;
use crate::pending::PendingMessage;
use crate::recommender::{ExpectedSpread, PriorityRecommender};
use crate::state::DispatcherState;
use crate::worker::{Shared, Worker};

/// Common surface of every dispatcher flavour
#[trait_variant::make(MessageDispatcher: Send)]
pub trait LocalMessageDispatcher {
    /// Payload accepted by the output channel
    type Message;
    /// Answer of a successful send
    type Output;

    /// Hand a message over for dispatch
    ///
    /// # Errors
    /// Fails immediately if `message_type` is not registered.
    fn submit(
        &self,
        message: Self::Message,
        message_type: MessageType,
        expiration: ExpirationDate,
    ) -> Result<Completion<Self::Output>, DispatcherError>;

    /// Messages waiting to be dispatched
    fn pending_count(&self) -> usize;

    /// The output channel may have a free slot
    fn wake(&self);

    /// Stop accepting messages and dispatch what is buffered
    fn request_drain(&self);

    /// Stop accepting messages and abandon what is buffered
    fn request_force_shutdown(&self);

    /// Force shutdown and wait for the worker to stop
    async fn close_and_wait(&self);
}

/// Weighted-fair dispatcher in front of a capacity-limited channel.
///
/// Owns exactly one worker task, spawned on construction. Producers may share
/// the dispatcher (e.g. behind an `Arc`) and submit concurrently.
pub struct PriorityDispatcher<C: OutputChannel> {
    shared: Arc<Shared<C::Message, C::Output>>,
    spread: Arc<ExpectedSpread>,
    channel: Arc<C>,
    shutdown_timeout: Duration,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<C: OutputChannel> PriorityDispatcher<C> {
    /// Validate `config` and spawn the worker.
    ///
    /// # Panics
    /// Must be called from within a Tokio runtime.
    pub fn spawn(config: &DispatcherConfig, channel: C) -> Result<Self, DispatcherError> {
        Self::spawn_with_waker(config, channel, DispatcherWaker::new())
    }

    /// Like [`spawn`](Self::spawn), sharing `waker` with the channel so it can
    /// signal freed capacity.
    #[instrument(
        name = "priority_dispatcher_spawn",
        skip_all,
        fields(dispatcher = %config.name)
    )]
    pub fn spawn_with_waker(
        config: &DispatcherConfig,
        channel: C,
        waker: DispatcherWaker,
    ) -> Result<Self, DispatcherError> {
        if config.polling_interval_ms == 0 {
            return Err(DispatcherError::config("polling interval must be positive"));
        }

        let spread = Arc::new(ExpectedSpread::new(&config.registered_types)?);
        let recommender = PriorityRecommender::from_spread(Arc::clone(&spread));
        let shared = Arc::new(Shared::new(config.name.clone(), waker));
        let channel = Arc::new(channel);

        let worker = Worker::new(
            Arc::clone(&shared),
            Arc::clone(&channel),
            recommender,
            config.polling_interval(),
        );
        let worker_handle = tokio::spawn(worker.run());

        info!(
            channel = %channel.name(),
            types = spread.len(),
            window_capacity = spread.window_capacity(),
            polling_interval_ms = config.polling_interval_ms,
            "Dispatcher started"
        );

        Ok(Self {
            shared,
            spread,
            channel,
            shutdown_timeout: config.shutdown_timeout(),
            worker: Mutex::new(Some(worker_handle)),
        })
    }

    /// Queue `message` for dispatch.
    ///
    /// Once the dispatcher left the active state the returned completion is
    /// already resolved with `NotSentShuttingDown`.
    ///
    /// # Errors
    /// [`DispatcherError::UnregisteredType`] if `message_type` is unknown.
    pub fn submit(
        &self,
        message: C::Message,
        message_type: impl Into<MessageType>,
        expiration: ExpirationDate,
    ) -> Result<Completion<C::Output>, DispatcherError> {
        let message_type = message_type.into();
        let metrics = &self.shared.metrics;

        if !self.spread.is_registered(&message_type) {
            metrics.inc_rejected("unregistered");
            return Err(DispatcherError::UnregisteredType {
                message_type,
                registered: self.registered_types(),
            });
        }

        if !self.shared.state.load().is_active() {
            metrics.inc_rejected("shutting_down");
            warn!(
                dispatcher = %self.shared.name,
                message_type = %message_type,
                "Dispatcher is shutting down, message not buffered"
            );
            return Ok(Completion::ready(Ok(SendResult::NotSentShuttingDown)));
        }

        let (slot, completion) = CompletionSlot::new(self.shared.waker.clone());
        metrics.inc_submitted(&message_type);
        self.shared
            .buffer
            .push(PendingMessage::new(message, message_type, slot, expiration));
        metrics.set_buffer_size(self.shared.buffer.size());
        self.shared.waker.wake();

        // The worker may have finished its last drain after we read `Active`
        if self.shared.is_terminated() {
            self.shared.abandon_buffered();
        }

        Ok(completion)
    }

    /// Messages currently buffered
    pub fn pending_count(&self) -> usize {
        self.shared.buffer.size()
    }

    /// Signal that the output channel may have a free slot
    pub fn wake(&self) {
        self.shared.waker.wake();
    }

    /// Clone of the wake signal, for channels that want to push wakes
    pub fn waker(&self) -> DispatcherWaker {
        self.shared.waker.clone()
    }

    /// `Active -> Draining`; no-op from any other state
    pub fn request_drain(&self) {
        self.transition(DispatcherState::Draining);
    }

    /// Move to `ForceShutdown`; always legal
    pub fn request_force_shutdown(&self) {
        self.transition(DispatcherState::ForceShutdown);
    }

    fn transition(&self, target: DispatcherState) {
        if self.shared.state.advance(target) {
            info!(dispatcher = %self.shared.name, state = %target, "Dispatcher state changed");
        }
        self.shared.waker.wake();
    }

    /// Force shutdown, then wait up to the configured ceiling for the worker.
    ///
    /// A worker still running after the ceiling is aborted and whatever it
    /// left buffered is resolved `NotSentShuttingDown`.
    #[instrument(
        name = "priority_dispatcher_close",
        skip(self),
        fields(dispatcher = %self.shared.name)
    )]
    pub async fn close_and_wait(&self) {
        self.request_force_shutdown();

        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(mut handle) = handle else {
            debug!("Dispatcher already closed");
            return;
        };

        match tokio::time::timeout(self.shutdown_timeout, &mut handle).await {
            Ok(Ok(())) => {
                debug!("Dispatcher worker joined");
            }
            Ok(Err(e)) => {
                error!(error = ?e, "Dispatcher worker panicked");
                self.shared.terminate();
            }
            Err(_) => {
                error!(
                    timeout_ms = saturating_millis(self.shutdown_timeout),
                    "Dispatcher worker did not stop in time, aborting"
                );
                handle.abort();
                self.shared.terminate();
            }
        }

        info!(pending = self.pending_count(), "Dispatcher closed");
    }

    pub fn state(&self) -> DispatcherState {
        self.shared.state.load()
    }

    /// `true` once the worker has stopped
    pub fn is_terminated(&self) -> bool {
        self.shared.is_terminated()
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Registered types in priority order
    pub fn registered_types(&self) -> Vec<MessageType> {
        self.spread.types().cloned().collect()
    }

    pub fn expected_spread(&self) -> &ExpectedSpread {
        &self.spread
    }

    pub fn metrics(&self) -> &Arc<DispatcherMetrics> {
        &self.shared.metrics
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }
}

fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl<C: OutputChannel> Drop for PriorityDispatcher<C> {
    fn drop(&mut self) {
        if self.shared.state.advance(DispatcherState::ForceShutdown) {
            debug!(dispatcher = %self.shared.name, "Dispatcher dropped, forcing shutdown");
        }
        self.shared.waker.wake();
    }
}

impl<C: OutputChannel> MessageDispatcher for PriorityDispatcher<C> {
    type Message = C::Message;
    type Output = C::Output;

    fn submit(
        &self,
        message: C::Message,
        message_type: MessageType,
        expiration: ExpirationDate,
    ) -> Result<Completion<C::Output>, DispatcherError> {
        PriorityDispatcher::submit(self, message, message_type, expiration)
    }

    fn pending_count(&self) -> usize {
        PriorityDispatcher::pending_count(self)
    }

    fn wake(&self) {
        PriorityDispatcher::wake(self)
    }

    fn request_drain(&self) {
        PriorityDispatcher::request_drain(self)
    }

    fn request_force_shutdown(&self) {
        PriorityDispatcher::request_force_shutdown(self)
    }

    async fn close_and_wait(&self) {
        PriorityDispatcher::close_and_wait(self).await
    }
}
