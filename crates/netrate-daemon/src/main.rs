//! Network throughput daemon
//!
//! Runs one sampler per configured entry and reports byte rates until it is
//! signalled or the configured duration elapses.

mod config;
mod output;

use anyhow::{Context, Result};
use clap::Parser;
use netrate::Sampler;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

use config::Config;

#[derive(Parser)]
#[command(name = "netrated")]
#[command(about = "Report network throughput from /proc/net/dev")]
#[command(version)]
struct Cli {
    /// Configuration file (built-in defaults if omitted)
    config: Option<PathBuf>,

    /// Stop after this many seconds, overriding the configuration
    #[arg(short, long)]
    duration: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging on stderr; stdout carries JSON rates
    let filter = EnvFilter::from_default_env().add_directive("info".parse()?);
    tracing::subscriber::set_global_default(log_subscriber(filter, std::io::stderr))
        .context("Failed to install log subscriber")?;

    // Load configuration
    let config = match &cli.config {
        Some(path) => {
            let config = Config::load(path).context("Failed to load configuration")?;
            info!("Loaded configuration from: {}", path.display());
            config
        }
        None => Config::default(),
    };

    let samplers = start_samplers(&config)?;
    info!("Running {} sampler(s)", samplers.len());

    // Setup Unix signal handlers
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())?;

    let duration = cli.duration.or(config.duration);
    let deadline = async {
        match duration {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        _ = deadline => {
            info!("Run duration elapsed, shutting down");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down");
        }
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down");
        }
    }

    for sampler in samplers {
        sampler.close();
    }

    Ok(())
}

fn log_subscriber<W>(filter: EnvFilter, writer: W) -> impl tracing::Subscriber + Send + Sync
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .finish()
}

fn start_samplers(config: &Config) -> Result<Vec<Sampler>> {
    config
        .samplers
        .iter()
        .map(|entry| {
            let mut builder =
                Sampler::builder(entry.name.clone(), entry.interval()).path(&entry.path);
            if let Some(interfaces) = &entry.interfaces {
                builder = builder.interfaces(interfaces.iter().cloned());
            }
            if let Some(callback) = output::callback(entry.output) {
                builder = builder.callback(callback);
            }
            builder
                .start()
                .with_context(|| format!("Failed to start sampler '{}'", entry.name))
        })
        .collect()
}
