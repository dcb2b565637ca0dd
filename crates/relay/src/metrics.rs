//! Relay counters for the end-of-run summary

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use observability::{RunningStats, StatsSummary};

/// Counters shared by every request handled by one relay
#[derive(Debug, Default)]
pub struct RelayMetrics {
    accepted: AtomicU64,
    rejected: AtomicU64,
    /// Destination answered 2xx
    forwarded: AtomicU64,
    /// Destination answered non-2xx
    destination_failures: AtomicU64,
    /// Destination unreachable or timed out
    destination_errors: AtomicU64,
    batches_decoded: AtomicU64,
    records_decoded: AtomicU64,
    decode_failures: AtomicU64,
    fan_outs: AtomicU64,
    destination_latency_ms: Mutex<RunningStats>,
}

impl RelayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn inc_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_destination(&self, success: bool, latency_ms: f64) {
        if success {
            self.forwarded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.destination_failures.fetch_add(1, Ordering::Relaxed);
        }
        self.destination_latency_ms
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(latency_ms);
    }

    pub(crate) fn inc_destination_errors(&self) {
        self.destination_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_decoded(&self, records: usize) {
        self.batches_decoded.fetch_add(1, Ordering::Relaxed);
        self.records_decoded
            .fetch_add(records as u64, Ordering::Relaxed);
    }

    pub(crate) fn inc_decode_failures(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_fan_outs(&self) {
        self.fan_outs.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all counters
    pub fn snapshot(&self) -> RelayMetricsSnapshot {
        RelayMetricsSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            forwarded: self.forwarded.load(Ordering::Relaxed),
            destination_failures: self.destination_failures.load(Ordering::Relaxed),
            destination_errors: self.destination_errors.load(Ordering::Relaxed),
            batches_decoded: self.batches_decoded.load(Ordering::Relaxed),
            records_decoded: self.records_decoded.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            fan_outs: self.fan_outs.load(Ordering::Relaxed),
            destination_latency_ms: self
                .destination_latency_ms
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .summary(),
        }
    }
}

/// Point-in-time copy of [`RelayMetrics`]
#[derive(Debug, Clone, Default)]
pub struct RelayMetricsSnapshot {
    pub accepted: u64,
    pub rejected: u64,
    pub forwarded: u64,
    pub destination_failures: u64,
    pub destination_errors: u64,
    pub batches_decoded: u64,
    pub records_decoded: u64,
    pub decode_failures: u64,
    pub fan_outs: u64,
    pub destination_latency_ms: StatsSummary,
}

impl std::fmt::Display for RelayMetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Relay Summary ===")?;
        writeln!(f, "Requests accepted: {}", self.accepted)?;
        writeln!(f, "Requests rejected: {}", self.rejected)?;
        writeln!(
            f,
            "Destination: {} ok, {} non-2xx, {} errors",
            self.forwarded, self.destination_failures, self.destination_errors
        )?;
        writeln!(f, "Destination latency (ms): {}", self.destination_latency_ms)?;
        writeln!(
            f,
            "Batches decoded: {} ({} records, {} failures)",
            self.batches_decoded, self.records_decoded, self.decode_failures
        )?;
        writeln!(f, "Fan-outs: {}", self.fan_outs)?;
        Ok(())
    }
}
