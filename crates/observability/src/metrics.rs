//! Relay metrics
//!
//! Thin wrappers over the `metrics` facade. Without an installed recorder
//! every call is a no-op.

use metrics::{counter, gauge, histogram};

/// Record a request rejected before forwarding (bad length, empty body)
pub fn record_request_rejected(reason: &'static str) {
    counter!("telemetry_relay_requests_rejected_total", "reason" => reason).increment(1);
}

/// Record a response from the canonical destination
pub fn record_destination_response(status: u16, latency_ms: f64) {
    let class = match status {
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        _ => "5xx",
    };
    counter!("telemetry_relay_destination_responses_total", "class" => class).increment(1);
    histogram!("telemetry_relay_destination_latency_ms").record(latency_ms);
}

/// Record a transport failure talking to the destination
pub fn record_destination_error() {
    counter!("telemetry_relay_destination_errors_total").increment(1);
}

/// Record a successfully decoded batch
pub fn record_batch_decoded(records: usize) {
    counter!("telemetry_relay_batches_decoded_total").increment(1);
    counter!("telemetry_relay_records_decoded_total").increment(records as u64);
    histogram!("telemetry_relay_batch_size").record(records as f64);
}

pub fn record_decode_failure() {
    counter!("telemetry_relay_decode_failures_total").increment(1);
}

/// Record one sink replication outcome
pub fn record_sink_result(sink_name: &str, success: bool, latency_ms: f64) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "telemetry_relay_sink_replications_total",
        "sink" => sink_name.to_string(),
        "status" => status
    )
    .increment(1);
    histogram!(
        "telemetry_relay_sink_latency_ms",
        "sink" => sink_name.to_string()
    )
    .record(latency_ms);
}

/// Record the number of background fan-outs still running
pub fn record_pending_fan_outs(pending: usize) {
    gauge!("telemetry_relay_pending_fan_outs").set(pending as f64);
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

/// Online mean/variance (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
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

    pub fn summary(&self) -> StatsSummary {
        StatsSummary::from(self)
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
    fn test_summary_display() {
        assert_eq!(StatsSummary::default().to_string(), "N/A");

        let mut stats = RunningStats::default();
        stats.push(20.0);
        stats.push(80.0);
        let output = stats.summary().to_string();
        assert!(output.contains("min=20.000"));
        assert!(output.contains("(n=2)"));
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_request_rejected("content_length");
        record_destination_response(503, 12.5);
        record_destination_error();
        record_batch_decoded(3);
        record_decode_failure();
        record_sink_result("es", false, 1.0);
        record_pending_fan_outs(0);
    }
}
