//! Byte-rate computation between consecutive counter reads.

use serde::{Serialize, Serializer};
use std::time::Duration;

/// Receive and transmit byte totals summed over the selected interfaces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

/// Throughput delivered to the sampler callback once per tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetRate {
    /// Label of the sampler that produced this rate
    pub name: String,
    /// Receive rate in bytes/second
    pub rx_bytes_per_sec: u64,
    /// Transmit rate in bytes/second
    pub tx_bytes_per_sec: u64,
    /// Sampling interval, serialized in milliseconds
    #[serde(serialize_with = "serialize_millis")]
    pub interval: Duration,
    /// Interface allow-list in effect (None = all interfaces)
    pub interfaces: Option<Vec<String>>,
}

fn serialize_millis<S: Serializer>(
    interval: &Duration,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(interval.as_millis()).unwrap_or(u64::MAX))
}

/// Tracks the previous totals and turns each new read into a rate.
///
/// Rates are computed over the configured interval truncated to whole
/// seconds, not over the measured time between reads. A missed tick shows up
/// as a larger delta in the next rate.
#[derive(Debug, Clone)]
pub struct RateTracker {
    seconds: u64,
    previous: Option<Totals>,
}

impl RateTracker {
    /// Creates a tracker for the given sampling interval.
    ///
    /// Sub-second remainders are dropped; intervals below one second count
    /// as one second.
    pub fn new(interval: Duration) -> Self {
        Self {
            seconds: interval.as_secs().max(1),
            previous: None,
        }
    }

    /// Returns true once a baseline has been recorded.
    pub fn is_primed(&self) -> bool {
        self.previous.is_some()
    }

    /// Previous totals, if any read has been observed.
    pub fn previous(&self) -> Option<Totals> {
        self.previous
    }

    /// Records `current` and returns the `(rx, tx)` rates since the previous
    /// observation, or `None` for the first one.
    ///
    /// A counter that went backwards (reset or wraparound) yields 0.
    pub fn observe(&mut self, current: Totals) -> Option<(u64, u64)> {
        let rates = self.previous.map(|previous| {
            (
                current.rx_bytes.saturating_sub(previous.rx_bytes) / self.seconds,
                current.tx_bytes.saturating_sub(previous.tx_bytes) / self.seconds,
            )
        });
        self.previous = Some(current);
        rates
    }
}
