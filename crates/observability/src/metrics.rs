//! Dispatcher metric collection
//!
//! Point events and the buffer gauge go through the `metrics` facade; the
//! aggregator keeps an in-memory view for end-of-run summaries.

use std::collections::BTreeMap;

use contracts::{MessageType, SendStatus};
use metrics::{counter, gauge, histogram};

/// Message accepted into a dispatcher buffer
pub fn record_message_submitted(dispatcher: &str, message_type: &str) {
    counter!(
        "prio_dispatch_messages_submitted_total",
        "dispatcher" => dispatcher.to_string(),
        "message_type" => message_type.to_string()
    )
    .increment(1);
}

/// Output channel answered successfully
pub fn record_message_sent(dispatcher: &str) {
    counter!(
        "prio_dispatch_messages_sent_total",
        "dispatcher" => dispatcher.to_string()
    )
    .increment(1);
}

/// Output channel raised or its answer failed
pub fn record_message_send_failed(dispatcher: &str) {
    counter!(
        "prio_dispatch_messages_send_failed_total",
        "dispatcher" => dispatcher.to_string()
    )
    .increment(1);
}

/// Message popped after its deadline
pub fn record_message_expired(dispatcher: &str, message_type: &str) {
    counter!(
        "prio_dispatch_messages_expired_total",
        "dispatcher" => dispatcher.to_string(),
        "message_type" => message_type.to_string()
    )
    .increment(1);
}

/// Submission refused (`reason` is e.g. "unregistered" or "shutting_down")
pub fn record_message_rejected(dispatcher: &str, reason: &'static str) {
    counter!(
        "prio_dispatch_messages_rejected_total",
        "dispatcher" => dispatcher.to_string(),
        "reason" => reason
    )
    .increment(1);
}

/// Buffered messages abandoned by a forced shutdown
pub fn record_message_force_completed(dispatcher: &str, count: u64) {
    counter!(
        "prio_dispatch_messages_force_completed_total",
        "dispatcher" => dispatcher.to_string()
    )
    .increment(count);
}

/// Live buffer size
pub fn record_buffer_size(dispatcher: &str, size: usize) {
    gauge!(
        "prio_dispatch_buffer_size",
        "dispatcher" => dispatcher.to_string()
    )
    .set(size as f64);
}

/// Time a message spent buffered before the worker popped it
pub fn record_buffer_wait_ms(dispatcher: &str, message_type: &str, wait_ms: f64) {
    histogram!(
        "prio_dispatch_buffer_wait_ms",
        "dispatcher" => dispatcher.to_string(),
        "message_type" => message_type.to_string()
    )
    .record(wait_ms);
}

/// Delivery statistics aggregator
///
/// Aggregates per-type outcomes in memory for summaries.
#[derive(Debug, Clone, Default)]
pub struct DeliveryStatsAggregator {
    per_type: BTreeMap<MessageType, TypeStats>,
}

#[derive(Debug, Clone, Default)]
struct TypeStats {
    sent: u64,
    not_sent: u64,
    shutting_down: u64,
    failed: u64,
    latency_ms: RunningStats,
}

impl DeliveryStatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a resolved message and its submit-to-resolution latency
    pub fn record(&mut self, message_type: &MessageType, status: SendStatus, latency_ms: f64) {
        let stats = self.per_type.entry(message_type.clone()).or_default();
        match status {
            SendStatus::Sent => stats.sent += 1,
            SendStatus::NotSent => stats.not_sent += 1,
            SendStatus::NotSentShuttingDown => stats.shutting_down += 1,
        }
        stats.latency_ms.push(latency_ms);
    }

    /// Record a message whose send failed
    pub fn record_failure(&mut self, message_type: &MessageType, latency_ms: f64) {
        let stats = self.per_type.entry(message_type.clone()).or_default();
        stats.failed += 1;
        stats.latency_ms.push(latency_ms);
    }

    /// Build the summary report
    pub fn summary(&self) -> DeliverySummary {
        let types = self
            .per_type
            .iter()
            .map(|(message_type, s)| TypeSummary {
                message_type: message_type.clone(),
                sent: s.sent,
                not_sent: s.not_sent,
                shutting_down: s.shutting_down,
                failed: s.failed,
                latency_ms: StatsSummary::from(&s.latency_ms),
            })
            .collect();
        DeliverySummary { types }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Per-type outcome counts
#[derive(Debug, Clone)]
pub struct TypeSummary {
    pub message_type: MessageType,
    pub sent: u64,
    pub not_sent: u64,
    pub shutting_down: u64,
    pub failed: u64,
    pub latency_ms: StatsSummary,
}

impl TypeSummary {
    pub fn total(&self) -> u64 {
        self.sent + self.not_sent + self.shutting_down + self.failed
    }
}

/// Delivery summary, ordered by type name
#[derive(Debug, Clone, Default)]
pub struct DeliverySummary {
    pub types: Vec<TypeSummary>,
}

impl DeliverySummary {
    pub fn total(&self) -> u64 {
        self.types.iter().map(TypeSummary::total).sum()
    }

    pub fn total_sent(&self) -> u64 {
        self.types.iter().map(|t| t.sent).sum()
    }
}

impl std::fmt::Display for DeliverySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Delivery Summary ===")?;
        writeln!(f, "Total messages: {}", self.total())?;
        for t in &self.types {
            writeln!(
                f,
                "{}: sent={} not_sent={} shutting_down={} failed={}",
                t.message_type, t.sent, t.not_sent, t.shutting_down, t.failed
            )?;
            writeln!(f, "  latency (ms): {}", t.latency_ms)?;
        }
        Ok(())
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// Add a sample
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();

        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_counts_per_type() {
        let mut aggregator = DeliveryStatsAggregator::new();
        let high: MessageType = "high".into();
        let low: MessageType = "low".into();

        aggregator.record(&high, SendStatus::Sent, 2.0);
        aggregator.record(&high, SendStatus::Sent, 4.0);
        aggregator.record(&low, SendStatus::NotSent, 10.0);
        aggregator.record(&low, SendStatus::NotSentShuttingDown, 1.0);
        aggregator.record_failure(&low, 3.0);

        let summary = aggregator.summary();
        assert_eq!(summary.total(), 5);
        assert_eq!(summary.total_sent(), 2);

        let high_summary = &summary.types[0];
        assert_eq!(high_summary.message_type, "high");
        assert_eq!(high_summary.sent, 2);
        assert!((high_summary.latency_ms.mean - 3.0).abs() < 1e-10);

        let low_summary = &summary.types[1];
        assert_eq!(low_summary.not_sent, 1);
        assert_eq!(low_summary.shutting_down, 1);
        assert_eq!(low_summary.failed, 1);
    }

    #[test]
    fn test_summary_display() {
        let mut aggregator = DeliveryStatsAggregator::new();
        aggregator.record(&"sms".into(), SendStatus::Sent, 5.0);

        let output = format!("{}", aggregator.summary());
        assert!(output.contains("Total messages: 1"));
        assert!(output.contains("sms: sent=1"));
    }

    #[test]
    fn test_recorders_without_installed_recorder_are_noops() {
        record_message_submitted("test", "high");
        record_message_expired("test", "high");
        record_message_rejected("test", "shutting_down");
        record_buffer_size("test", 3);
        record_buffer_wait_ms("test", "high", 1.5);
    }
}
