//! Per-dispatcher counters
//!
//! Every increment is mirrored to the global `metrics` recorder through the
//! `observability` helpers, labelled by dispatcher name.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Metrics for a single dispatcher
#[derive(Debug)]
pub struct DispatcherMetrics {
    name: String,
    /// Current buffer size
    buffer_size: AtomicUsize,
    /// Messages accepted into the buffer
    submitted: AtomicU64,
    /// Messages the output channel answered successfully
    sent: AtomicU64,
    /// Messages whose send raised or failed
    send_failed: AtomicU64,
    /// Messages resolved `NotSent` because they expired in the buffer
    expired: AtomicU64,
    /// Submissions refused (unregistered type or shutting down)
    rejected: AtomicU64,
    /// Buffered messages abandoned by a forced shutdown
    force_completed: AtomicU64,
}

impl DispatcherMetrics {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            buffer_size: AtomicUsize::new(0),
            submitted: AtomicU64::new(0),
            sent: AtomicU64::new(0),
            send_failed: AtomicU64::new(0),
            expired: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            force_completed: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size.load(Ordering::Relaxed)
    }

    pub fn set_buffer_size(&self, size: usize) {
        self.buffer_size.store(size, Ordering::Relaxed);
        observability::record_buffer_size(&self.name, size);
    }

    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    pub fn inc_submitted(&self, message_type: &str) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
        observability::record_message_submitted(&self.name, message_type);
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn inc_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
        observability::record_message_sent(&self.name);
    }

    pub fn send_failed(&self) -> u64 {
        self.send_failed.load(Ordering::Relaxed)
    }

    pub fn inc_send_failed(&self) {
        self.send_failed.fetch_add(1, Ordering::Relaxed);
        observability::record_message_send_failed(&self.name);
    }

    pub fn expired(&self) -> u64 {
        self.expired.load(Ordering::Relaxed)
    }

    pub fn inc_expired(&self, message_type: &str) {
        self.expired.fetch_add(1, Ordering::Relaxed);
        observability::record_message_expired(&self.name, message_type);
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn inc_rejected(&self, reason: &'static str) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
        observability::record_message_rejected(&self.name, reason);
    }

    pub fn force_completed(&self) -> u64 {
        self.force_completed.load(Ordering::Relaxed)
    }

    pub fn add_force_completed(&self, count: usize) {
        if count == 0 {
            return;
        }
        self.force_completed.fetch_add(count as u64, Ordering::Relaxed);
        observability::record_message_force_completed(&self.name, count as u64);
    }

    /// Time a popped message spent buffered
    pub fn observe_buffer_wait(&self, message_type: &str, wait_ms: f64) {
        observability::record_buffer_wait_ms(&self.name, message_type, wait_ms);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            buffer_size: self.buffer_size(),
            submitted: self.submitted(),
            sent: self.sent(),
            send_failed: self.send_failed(),
            expired: self.expired(),
            rejected: self.rejected(),
            force_completed: self.force_completed(),
        }
    }
}

/// Snapshot of dispatcher metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub buffer_size: usize,
    pub submitted: u64,
    pub sent: u64,
    pub send_failed: u64,
    pub expired: u64,
    pub rejected: u64,
    pub force_completed: u64,
}

impl MetricsSnapshot {
    /// Messages resolved by the worker or a shutdown
    pub fn resolved(&self) -> u64 {
        self.sent + self.send_failed + self.expired + self.force_completed
    }
}
