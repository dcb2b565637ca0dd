//! Relay service orchestration.

mod server;
mod stats;

pub use server::{RelayService, ServiceConfig};
pub use stats::RunStats;
