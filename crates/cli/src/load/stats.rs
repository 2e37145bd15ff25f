//! Load run statistics.

use std::time::Duration;

use dispatcher::MetricsSnapshot;
use observability::DeliverySummary;

use super::ShutdownMode;

/// Statistics from a load run
#[derive(Debug, Clone)]
pub struct RunStats {
    /// Wall time from dispatcher start to close
    pub duration: Duration,

    /// Messages accepted by `submit`
    pub submitted: u64,

    /// How the run was ended
    pub shutdown: ShutdownMode,

    /// Per-type outcomes as seen by producers
    pub delivery: DeliverySummary,

    /// Dispatcher counters at close
    pub dispatcher: MetricsSnapshot,

    /// Messages the simulated channel acknowledged
    pub delivered_by_channel: u64,
}

impl RunStats {
    /// Sent messages per second
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.delivery.total_sent() as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                     Dispatch Statistics                      ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Shutdown: {}", self.shutdown);
        println!("   ├─ Submitted: {}", self.submitted);
        println!("   ├─ Sent: {}", self.delivery.total_sent());
        println!("   ├─ Channel deliveries: {}", self.delivered_by_channel);
        println!("   └─ Throughput: {:.2} msg/s", self.throughput());

        let d = &self.dispatcher;
        println!("\n📈 Dispatcher Counters");
        println!("   ├─ Expired: {}", d.expired);
        println!("   ├─ Send failed: {}", d.send_failed);
        println!("   ├─ Rejected: {}", d.rejected);
        println!("   ├─ Abandoned on shutdown: {}", d.force_completed);
        println!("   └─ Left in buffer: {}", d.buffer_size);

        if !self.delivery.types.is_empty() {
            println!("\n📬 Per Type");
            let last = self.delivery.types.len() - 1;
            for (i, t) in self.delivery.types.iter().enumerate() {
                let prefix = if i == last { "└─" } else { "├─" };
                let child = if i == last { "   " } else { "│  " };
                println!(
                    "   {} {}: sent={} not_sent={} shutting_down={} failed={}",
                    prefix, t.message_type, t.sent, t.not_sent, t.shutting_down, t.failed
                );
                println!("   {}  └─ latency (ms): {}", child, t.latency_ms);
            }
        }

        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throughput() {
        let stats = RunStats {
            duration: Duration::from_secs(2),
            submitted: 0,
            shutdown: ShutdownMode::Wait,
            delivery: DeliverySummary::default(),
            dispatcher: MetricsSnapshot::default(),
            delivered_by_channel: 0,
        };
        assert_eq!(stats.throughput(), 0.0);

        let instant = RunStats {
            duration: Duration::ZERO,
            ..stats
        };
        assert_eq!(instant.throughput(), 0.0);
    }
}
