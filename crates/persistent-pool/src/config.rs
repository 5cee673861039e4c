//! Layered configuration for tuning a pool, and for the logging setup a
//! consuming binary wires up around it.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing_subscriber::filter::LevelFilter;

/// Tuning knobs for a [`crate::pool::Pool`], loadable from the environment
/// (prefix `PERSISTENT_POOL_`) and/or a config file via the `config` crate.
#[derive(Debug, Clone, Deserialize)]
pub struct PoolConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_graceful_save")]
    pub graceful_save: bool,

    #[serde(default = "default_min_save_interval_ms", rename = "min_save_interval_ms")]
    pub min_save_interval_ms: u64,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl PoolConfig {
    pub fn min_save_interval(&self) -> Duration {
        Duration::from_millis(self.min_save_interval_ms)
    }

    /// Loads configuration layered as: built-in defaults, then an optional
    /// file at `path` if it exists, then environment variables prefixed
    /// `PERSISTENT_POOL_` (e.g. `PERSISTENT_POOL_CONCURRENCY=8`).
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("concurrency", default_concurrency() as i64)?
            .set_default("graceful_save", default_graceful_save())?
            .set_default("min_save_interval_ms", default_min_save_interval_ms() as i64)?;

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder
            .add_source(config::Environment::with_prefix("PERSISTENT_POOL"))
            .build()?
            .try_deserialize()
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            graceful_save: default_graceful_save(),
            min_save_interval_ms: default_min_save_interval_ms(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_concurrency() -> usize {
    4
}

fn default_graceful_save() -> bool {
    true
}

fn default_min_save_interval_ms() -> u64 {
    200
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum LoggingLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
    Off,
}

impl From<LoggingLevel> for LevelFilter {
    fn from(value: LoggingLevel) -> Self {
        match value {
            LoggingLevel::Error => LevelFilter::ERROR,
            LoggingLevel::Warn => LevelFilter::WARN,
            LoggingLevel::Info => LevelFilter::INFO,
            LoggingLevel::Debug => LevelFilter::DEBUG,
            LoggingLevel::Trace => LevelFilter::TRACE,
            LoggingLevel::Off => LevelFilter::OFF,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub log_file: Option<String>,

    #[serde(default)]
    pub max_level: LoggingLevel,
}
