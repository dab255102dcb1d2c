//! Background throughput sampler.
//!
//! A [`Sampler`] owns one Tokio task that reads the counter file once per
//! interval, sums the byte counters of the selected interfaces and passes the
//! resulting rates to a callback. The first successful read only records a
//! baseline. Read errors are logged and the next tick tries again.
//!
//! If the task panics (for example inside the callback) the panic is logged
//! and that sampler stops producing rates. The host process and other
//! samplers are unaffected, and no further signal is given to the owner.

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::counters::read_counters;
use crate::error::{Error, Result};
use crate::rate::{NetRate, RateTracker};
use crate::DEFAULT_COUNTER_PATH;

/// Receives one [`NetRate`] per tick, inline on the sampler task.
pub type Callback = Box<dyn FnMut(NetRate) + Send + 'static>;

/// Configuration for a [`Sampler`], with defaults applied by
/// [`Sampler::builder`].
pub struct SamplerBuilder {
    name: String,
    interval: Duration,
    path: PathBuf,
    interfaces: Option<Vec<String>>,
    callback: Callback,
}

impl SamplerBuilder {
    fn new(name: String, interval: Duration) -> Self {
        Self {
            name,
            interval,
            path: PathBuf::from(DEFAULT_COUNTER_PATH),
            interfaces: None,
            callback: Box::new(log_rate),
        }
    }

    /// Reads counters from `path` instead of `/proc/net/dev`.
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    /// Only sums the listed interfaces. An empty list means all interfaces.
    pub fn interfaces<I, S>(mut self, interfaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.interfaces = Some(interfaces.into_iter().map(Into::into).collect());
        self
    }

    /// Replaces the default logging callback.
    ///
    /// The callback runs on the sampler task between ticks and must not block
    /// for long; a slow callback delays (and may skip) the following ticks.
    pub fn callback<F>(mut self, callback: F) -> Self
    where
        F: FnMut(NetRate) + Send + 'static,
    {
        self.callback = Box::new(callback);
        self
    }

    /// Spawns the sampling task on the current Tokio runtime.
    ///
    /// No I/O happens here; the first read takes place one interval later.
    /// Fails if the interval is shorter than one second or if called outside
    /// a Tokio runtime. Rates are divided by the whole seconds of the
    /// interval, so a sub-second interval has no valid divisor; it is
    /// rejected here rather than stopping the sampler after its first read.
    #[must_use = "dropping the Sampler stops sampling"]
    pub fn start(self) -> Result<Sampler> {
        if self.interval.as_secs() == 0 {
            return Err(Error::InvalidInterval(self.interval));
        }
        let runtime = tokio::runtime::Handle::try_current()?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let name = self.name.clone();
        let task = SamplerTask {
            tracker: RateTracker::new(self.interval),
            name: self.name,
            interval: self.interval,
            path: self.path,
            interfaces: self.interfaces,
            callback: self.callback,
        };

        info!(
            "Starting sampler '{}' on {} every {:?}",
            task.name,
            task.path.display(),
            task.interval
        );
        runtime.spawn(task.run_guarded(shutdown_rx));

        Ok(Sampler {
            name,
            shutdown: shutdown_tx,
        })
    }
}

/// Handle to a running sampler.
///
/// Dropping the handle stops the sampler just like [`Sampler::close`], so it
/// must be kept alive for as long as rates are wanted.
#[derive(Debug)]
#[must_use = "dropping the Sampler stops sampling"]
pub struct Sampler {
    name: String,
    shutdown: oneshot::Sender<()>,
}

impl Sampler {
    /// Begins configuring a sampler with the default counter path, all
    /// interfaces and a callback that logs each rate.
    pub fn builder(name: impl Into<String>, interval: Duration) -> SamplerBuilder {
        SamplerBuilder::new(name.into(), interval)
    }

    /// Starts a sampler with default settings.
    ///
    /// Fails for intervals shorter than one second, see
    /// [`SamplerBuilder::start`].
    #[must_use = "dropping the Sampler stops sampling"]
    pub fn start(name: impl Into<String>, interval: Duration) -> Result<Self> {
        Self::builder(name, interval).start()
    }

    /// Returns the sampler's name label.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Signals the sampling task to stop.
    ///
    /// Returns immediately without waiting for the task to exit. A read that
    /// is already in progress completes, but no further rates are delivered.
    pub fn close(self) {
        debug!("Closing sampler '{}'", self.name);
        // The task may already be gone after a panic.
        let _ = self.shutdown.send(());
    }
}

/// State owned by the sampling task.
struct SamplerTask {
    name: String,
    interval: Duration,
    path: PathBuf,
    interfaces: Option<Vec<String>>,
    callback: Callback,
    tracker: RateTracker,
}

impl SamplerTask {
    async fn run_guarded(self, shutdown: oneshot::Receiver<()>) {
        let name = self.name.clone();
        if let Err(panic) = AssertUnwindSafe(self.run(shutdown)).catch_unwind().await {
            error!(
                name = %name,
                reason = %panic_reason(&*panic),
                "Sampler task panicked, sampling stopped"
            );
        }
    }

    async fn run(mut self, mut shutdown: oneshot::Receiver<()>) {
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    debug!("Sampler '{}' stopped", self.name);
                    return;
                }
                _ = ticker.tick() => self.tick(),
            }
        }
    }

    fn tick(&mut self) {
        let snapshot = match read_counters(&self.path, self.interfaces.as_deref()) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(
                    name = %self.name,
                    path = %self.path.display(),
                    error = %e,
                    "Failed to read interface counters"
                );
                return;
            }
        };

        if let Some((rx_bytes_per_sec, tx_bytes_per_sec)) = self.tracker.observe(snapshot.totals())
        {
            (self.callback)(NetRate {
                name: self.name.clone(),
                rx_bytes_per_sec,
                tx_bytes_per_sec,
                interval: self.interval,
                interfaces: self.interfaces.clone(),
            });
        }
    }
}

/// Default callback: one structured log line per rate.
fn log_rate(rate: NetRate) {
    info!(
        name = %rate.name,
        rx_bytes_per_sec = rate.rx_bytes_per_sec,
        tx_bytes_per_sec = rate.tx_bytes_per_sec,
        interfaces = ?rate.interfaces,
        interval = ?rate.interval,
        "Network throughput"
    );
}

fn panic_reason(panic: &(dyn Any + Send)) -> &str {
    if let Some(reason) = panic.downcast_ref::<&str>() {
        *reason
    } else if let Some(reason) = panic.downcast_ref::<String>() {
        reason.as_str()
    } else {
        "unknown"
    }
}
