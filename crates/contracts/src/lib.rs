//! # Contracts
//!
//! Frozen interface contracts shared by every relay crate.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Data flow
//! - Inbound request body + `HeaderSet` enter the relay
//! - The batch codec turns the body into a `TelemetryBatch`
//! - Every `ReplicationSink` receives the same batch and the filtered headers

mod batch;
mod blueprint;
mod error;
mod headers;
mod sink;

pub use batch::*;
pub use blueprint::*;
pub use error::*;
pub use headers::*;
pub use sink::*;
