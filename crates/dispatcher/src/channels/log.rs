//! LogHandler - logs each payload via tracing

use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use contracts::{ContractError, ExpirationDate, MessageHandler};
use tracing::{info, instrument};

/// Receipt returned for every logged message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReceipt {
    /// Position of the message in the handler's delivery order, from 1
    pub sequence: u64,
    /// Milliseconds left before the deadline at delivery
    pub remaining_ms: i64,
}

/// Handler that logs payloads, optionally simulating transport latency
pub struct LogHandler<M> {
    name: String,
    latency: Option<Duration>,
    delivered: AtomicU64,
    _payload: PhantomData<fn(M)>,
}

impl<M> fmt::Debug for LogHandler<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogHandler")
            .field("name", &self.name)
            .field("latency", &self.latency)
            .field("delivered", &self.delivered())
            .finish()
    }
}

impl<M> LogHandler<M> {
    /// Create a new LogHandler with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            latency: None,
            delivered: AtomicU64::new(0),
            _payload: PhantomData,
        }
    }

    /// Sleep `latency` before acknowledging each message
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = (!latency.is_zero()).then_some(latency);
        self
    }

    /// Messages delivered so far
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }
}

impl<M> MessageHandler for LogHandler<M>
where
    M: fmt::Debug + Send + 'static,
{
    type Message = M;
    type Output = DeliveryReceipt;

    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_handler_handle",
        skip(self, message),
        fields(handler = %self.name)
    )]
    async fn handle(
        &self,
        message: M,
        expiration: ExpirationDate,
    ) -> Result<DeliveryReceipt, ContractError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let sequence = self.delivered.fetch_add(1, Ordering::Relaxed) + 1;
        let remaining_ms = expiration.remaining_ms();
        info!(
            handler = %self.name,
            sequence,
            remaining_ms,
            payload = ?message,
            "Message delivered"
        );

        Ok(DeliveryReceipt {
            sequence,
            remaining_ms,
        })
    }
}
