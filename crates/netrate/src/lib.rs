//! Network throughput sampler
//!
//! Periodically reads the kernel's per-interface traffic counters
//! (`/proc/net/dev`), sums them across a selected set of interfaces and
//! hands the resulting byte rates to a callback.

pub mod counters;
pub mod error;
pub mod rate;
pub mod sampler;

pub use counters::{
    parse_counters, read_counters, InterfaceStats, ReceiveStats, Snapshot, TransmitStats,
};
pub use error::{Error, Result};
pub use rate::{NetRate, RateTracker, Totals};
pub use sampler::{Callback, Sampler, SamplerBuilder};

/// Default location of the per-interface counter file.
pub const DEFAULT_COUNTER_PATH: &str = "/proc/net/dev";
