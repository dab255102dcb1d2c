//! Rate sinks selected by the `output` setting.

use anyhow::{Context, Result};
use netrate::NetRate;
use std::io::Write;
use tracing::warn;

use crate::config::Output;

/// Builds the callback for an output format.
///
/// Returns `None` for [`Output::Log`], which is the sampler's own default.
pub fn callback(output: Output) -> Option<impl FnMut(NetRate) + Send + 'static> {
    match output {
        Output::Log => None,
        Output::Json => Some(|rate: NetRate| {
            let stdout = std::io::stdout();
            if let Err(e) = write_json(&mut stdout.lock(), &rate) {
                warn!("Failed to write rate for '{}': {}", rate.name, e);
            }
        }),
    }
}

/// Writes one rate as a single JSON line.
pub fn write_json<W: Write>(writer: &mut W, rate: &NetRate) -> Result<()> {
    serde_json::to_writer(&mut *writer, rate).context("Failed to serialize rate")?;
    writer.write_all(b"\n").context("Failed to write rate")?;
    writer.flush().context("Failed to flush output")?;
    Ok(())
}
