//! Error types for the network throughput sampler.

use std::time::Duration;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when reading counters or starting a sampler.
#[derive(Error, Debug)]
pub enum Error {
    /// Counter source could not be opened or read.
    #[error("Counter source I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Sampling interval must be at least one whole second.
    #[error("Invalid sampling interval (must be at least 1s): {0:?}")]
    InvalidInterval(Duration),

    /// Sampler was started outside of a Tokio runtime.
    #[error("No Tokio runtime available: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
}
