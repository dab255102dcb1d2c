//! Configuration management.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Stop after this many seconds (None = run until signalled)
    #[serde(default)]
    pub duration: Option<u64>,

    /// Samplers to run
    #[serde(default = "default_samplers", rename = "sampler")]
    pub samplers: Vec<SamplerConfig>,
}

/// One sampler entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Label attached to every reported rate
    #[serde(default = "default_name")]
    pub name: String,

    /// Sampling interval in milliseconds (at least 1000)
    #[serde(default = "default_interval")]
    pub interval: u64,

    /// Interfaces to sum (None = all)
    #[serde(default)]
    pub interfaces: Option<Vec<String>>,

    /// Counter file path
    #[serde(default = "default_path")]
    pub path: String,

    /// Where rates are written
    #[serde(default)]
    pub output: Output,
}

/// Rate output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Output {
    /// Structured log line
    #[default]
    Log,
    /// One JSON object per line on stdout (logs go to stderr)
    Json,
}

impl SamplerConfig {
    /// Sampling interval as a duration.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval)
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            interval: default_interval(),
            interfaces: None,
            path: default_path(),
            output: Output::default(),
        }
    }
}

// Default value functions
fn default_samplers() -> Vec<SamplerConfig> {
    vec![SamplerConfig::default()]
}

fn default_name() -> String {
    "all".to_string()
}

fn default_interval() -> u64 {
    1000
}

fn default_path() -> String {
    netrate::DEFAULT_COUNTER_PATH.to_string()
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content =
            std::fs::read_to_string(path.as_ref()).context("Failed to read configuration file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse configuration")?;
        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            duration: None,
            samplers: default_samplers(),
        }
    }
}
