//! Run statistics.

use std::time::Duration;

use dispatcher::MetricsSnapshot;
use relay::RelayMetricsSnapshot;

/// Statistics from one relay run
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Total duration of the run
    pub duration: Duration,

    /// Relay counters
    pub relay: RelayMetricsSnapshot,

    /// Per-sink counters, in registration order
    pub sinks: Vec<(String, MetricsSnapshot)>,
}

impl RunStats {
    /// Accepted requests per second
    pub fn requests_per_sec(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.relay.accepted as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!();
        print!("{}", self.relay);
        println!(
            "Duration: {:.2}s ({:.2} req/s)",
            self.duration.as_secs_f64(),
            self.requests_per_sec()
        );

        if !self.sinks.is_empty() {
            println!("\nSinks ({}):", self.sinks.len());
            for (name, m) in &self.sinks {
                println!(
                    "  - {}: {} ok ({} records), {} failed, {} timed out",
                    name, m.replicated_count, m.record_count, m.failure_count, m.timeout_count
                );
            }
        }

        println!();
    }
}
