//! Load generator - submits messages for every registered type and collects
//! their outcomes.

use std::future::Future;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{DispatcherConfig, ExpirationDate, MessageType};
use dispatcher::{
    DeliveryReceipt, DispatcherWaker, LimitedChannel, LogHandler, Outcome, PriorityDispatcher,
};
use observability::DeliveryStatsAggregator;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use super::RunStats;

/// What happens once every message has been submitted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ShutdownMode {
    /// Wait for every message to resolve, then close
    #[default]
    Wait,
    /// Request a drain right away
    Drain,
    /// Request a forced shutdown right away
    Force,
}

impl std::fmt::Display for ShutdownMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Wait => "wait",
            Self::Drain => "drain",
            Self::Force => "force",
        };
        f.write_str(s)
    }
}

/// Load run configuration
#[derive(Debug, Clone)]
pub struct LoadConfig {
    pub dispatcher: DispatcherConfig,
    /// Messages submitted per registered type
    pub messages_per_type: usize,
    /// Concurrent sends the simulated channel accepts
    pub max_in_flight: usize,
    /// Simulated delivery latency
    pub latency: Duration,
    /// Time-to-live of each message
    pub ttl_ms: i64,
    pub shutdown: ShutdownMode,
}

type Resolved = (MessageType, Outcome<DeliveryReceipt>, Duration);

/// Drives one dispatcher against a [`LimitedChannel`] over a [`LogHandler`]
pub struct LoadGenerator {
    config: LoadConfig,
}

impl LoadGenerator {
    pub fn new(config: LoadConfig) -> Self {
        Self { config }
    }

    /// Run to completion
    pub async fn run(self) -> Result<RunStats> {
        self.run_until(std::future::pending()).await
    }

    /// Run until completion or until `interrupt` resolves, whichever is first.
    ///
    /// On interrupt the dispatcher is closed and whatever it still buffered
    /// is reported as shutting down.
    #[instrument(
        name = "load_generator_run",
        skip_all,
        fields(dispatcher = %self.config.dispatcher.name, shutdown = %self.config.shutdown)
    )]
    pub async fn run_until<F>(self, interrupt: F) -> Result<RunStats>
    where
        F: Future<Output = ()>,
    {
        let LoadConfig {
            dispatcher: dispatcher_config,
            messages_per_type,
            max_in_flight,
            latency,
            ttl_ms,
            shutdown,
        } = self.config;
        let started = Instant::now();

        let waker = DispatcherWaker::new();
        let handler = LogHandler::<String>::new(format!("{}-channel", dispatcher_config.name))
            .with_latency(latency);
        let channel = LimitedChannel::new(handler, max_in_flight).with_waker(waker.clone());
        let dispatcher = PriorityDispatcher::spawn_with_waker(&dispatcher_config, channel, waker)
            .context("Failed to start dispatcher")?;

        let types = dispatcher.registered_types();
        let mut outcomes: JoinSet<Resolved> = JoinSet::new();
        let mut submitted = 0u64;

        for i in 0..messages_per_type {
            for message_type in &types {
                let completion = dispatcher.submit(
                    format!("{message_type}-{i}"),
                    message_type.clone(),
                    ExpirationDate::expires_in_ms(ttl_ms),
                )?;
                submitted += 1;

                let message_type = message_type.clone();
                let submitted_at = Instant::now();
                outcomes.spawn(async move {
                    let outcome = completion.await;
                    (message_type, outcome, submitted_at.elapsed())
                });
            }
        }
        info!(
            submitted,
            pending = dispatcher.pending_count(),
            "All messages submitted"
        );

        match shutdown {
            ShutdownMode::Wait => {}
            ShutdownMode::Drain => dispatcher.request_drain(),
            ShutdownMode::Force => dispatcher.request_force_shutdown(),
        }

        let collect = collect_outcomes(outcomes);
        tokio::pin!(collect);
        tokio::pin!(interrupt);

        let delivery = tokio::select! {
            delivery = &mut collect => delivery,
            _ = &mut interrupt => {
                warn!("Interrupted, closing dispatcher");
                dispatcher.close_and_wait().await;
                collect.await
            }
        };

        dispatcher.close_and_wait().await;

        Ok(RunStats {
            duration: started.elapsed(),
            submitted,
            shutdown,
            delivery: delivery.summary(),
            dispatcher: dispatcher.metrics().snapshot(),
            delivered_by_channel: dispatcher.channel().handler().delivered(),
        })
    }
}

async fn collect_outcomes(mut outcomes: JoinSet<Resolved>) -> DeliveryStatsAggregator {
    let mut delivery = DeliveryStatsAggregator::new();

    while let Some(joined) = outcomes.join_next().await {
        match joined {
            Ok((message_type, Ok(result), latency)) => {
                delivery.record(&message_type, result.status(), as_ms(latency));
            }
            Ok((message_type, Err(e), latency)) => {
                debug!(message_type = %message_type, error = %e, "Message failed");
                delivery.record_failure(&message_type, as_ms(latency));
            }
            Err(e) => {
                warn!(error = %e, "Outcome task failed");
            }
        }
    }

    delivery
}

fn as_ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}
