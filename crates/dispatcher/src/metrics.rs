//! Sink metrics for observability

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Metrics for a single sink
#[derive(Debug, Default)]
pub struct SinkMetrics {
    /// Replications currently running
    in_flight: AtomicUsize,
    /// Total successful replications
    replicated_count: AtomicU64,
    /// Total records delivered by successful replications
    record_count: AtomicU64,
    /// Total replication failures (including timeouts)
    failure_count: AtomicU64,
    /// Failures caused by the sink timeout
    timeout_count: AtomicU64,
}

impl SinkMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    pub(crate) fn enter(&self) {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn exit(&self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }

    /// Get total successful replications
    pub fn replicated_count(&self) -> u64 {
        self.replicated_count.load(Ordering::Relaxed)
    }

    /// Record a successful replication of `records` records
    pub fn inc_replicated(&self, records: usize) {
        self.replicated_count.fetch_add(1, Ordering::Relaxed);
        self.record_count
            .fetch_add(records as u64, Ordering::Relaxed);
    }

    pub fn record_count(&self) -> u64 {
        self.record_count.load(Ordering::Relaxed)
    }

    /// Get failure count
    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    /// Increment failure count
    pub fn inc_failure_count(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn timeout_count(&self) -> u64 {
        self.timeout_count.load(Ordering::Relaxed)
    }

    pub fn inc_timeout_count(&self) {
        self.timeout_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            in_flight: self.in_flight(),
            replicated_count: self.replicated_count(),
            record_count: self.record_count(),
            failure_count: self.failure_count(),
            timeout_count: self.timeout_count(),
        }
    }
}

/// Snapshot of sink metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub in_flight: usize,
    pub replicated_count: u64,
    pub record_count: u64,
    pub failure_count: u64,
    pub timeout_count: u64,
}
