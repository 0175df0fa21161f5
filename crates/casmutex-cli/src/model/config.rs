//! Configuration management for the casmutex CLI
//!
//! Sources, lowest to highest precedence:
//! - `conf/casmutex.yml` (or the file given with `--config`)
//! - `CASMUTEX_*` environment variables, `__` separating nested keys
//!   (e.g. `CASMUTEX_COORDINATOR__KEY_PREFIX`)
//! - command-line flags

use ::config::{Config, ConfigError, Environment, File};
use anyhow::Context;
use casmutex_core::{CoordinatorConfig, INFINITE_MILLIS};
use clap::{Args, Parser, Subcommand};

use crate::startup::LoggingConfig;

pub const DEFAULT_CONFIG_FILE: &str = "conf/casmutex.yml";

/// Command line arguments
#[derive(Debug, Parser)]
#[command(name = "casmutex", version, about = "Distributed mutex drills over a CAS key-value store")]
pub struct Cli {
    /// Configuration file (YAML, TOML or JSON)
    #[arg(short = 'c', long = "config", env = "CASMUTEX_CONFIG")]
    pub config_file: Option<String>,

    /// Owner id for this process; must be unique across the lock namespace
    #[arg(long = "owner-id")]
    pub owner_id: Option<String>,

    /// Prefix for every lock key in the store
    #[arg(long = "key-prefix")]
    pub key_prefix: Option<String>,

    /// Delay between acquisition attempts
    #[arg(long = "retry-interval-ms")]
    pub retry_interval_ms: Option<u64>,

    /// Log level or filter directive
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run several coordinators against one lock and check they never overlap
    Contend(ContendArgs),
    /// Walk through a two-instance acquire/timeout/release/handover sequence
    Scenario(ScenarioArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ContendArgs {
    /// Number of competing coordinators
    #[arg(short = 'w', long, default_value_t = 4)]
    pub workers: usize,

    /// Acquire/release rounds per worker
    #[arg(short = 'r', long, default_value_t = 10)]
    pub rounds: usize,

    /// Lock name to contend for
    #[arg(long, default_value = "job-42")]
    pub lock: String,

    /// How long each worker holds the lock
    #[arg(long, default_value_t = 5)]
    pub hold_ms: u64,

    /// Per-acquisition timeout, -1 for none
    #[arg(long, default_value_t = INFINITE_MILLIS, allow_negative_numbers = true)]
    pub timeout_ms: i64,

    /// Lock lifetime, -1 for infinite
    #[arg(long, default_value_t = INFINITE_MILLIS, allow_negative_numbers = true)]
    pub lifetime_ms: i64,
}

impl Default for ContendArgs {
    fn default() -> Self {
        Self {
            workers: 4,
            rounds: 10,
            lock: "job-42".to_string(),
            hold_ms: 5,
            timeout_ms: INFINITE_MILLIS,
            lifetime_ms: INFINITE_MILLIS,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct ScenarioArgs {
    /// Lock name used by both instances
    #[arg(long, default_value = "job-42")]
    pub lock: String,

    /// Lifetime requested by both instances, -1 for infinite
    #[arg(long, default_value_t = 5000, allow_negative_numbers = true)]
    pub lifetime_ms: i64,

    /// Timeout used by the second instance, -1 for none
    #[arg(long, default_value_t = 200, allow_negative_numbers = true)]
    pub timeout_ms: i64,
}

impl Default for ScenarioArgs {
    fn default() -> Self {
        Self {
            lock: "job-42".to_string(),
            lifetime_ms: 5000,
            timeout_ms: 200,
        }
    }
}

/// Application configuration loaded from file, environment and flags
#[derive(Clone, Debug, Default)]
pub struct Configuration {
    pub config: Config,
}

impl Configuration {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let file_name = cli.config_file.as_deref().unwrap_or(DEFAULT_CONFIG_FILE);

        let mut builder = Config::builder()
            .add_source(File::with_name(file_name).required(cli.config_file.is_some()))
            .add_source(
                Environment::with_prefix("CASMUTEX")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        if let Some(v) = &cli.owner_id {
            builder = builder.set_override("coordinator.owner_id", v.as_str())?;
        }
        if let Some(v) = &cli.key_prefix {
            builder = builder.set_override("coordinator.key_prefix", v.as_str())?;
        }
        if let Some(v) = cli.retry_interval_ms {
            builder = builder.set_override("coordinator.retry_interval_ms", v as i64)?;
        }
        if let Some(v) = &cli.log_level {
            builder = builder.set_override("log.level", v.as_str())?;
        }

        let config = builder
            .build()
            .with_context(|| format!("failed to load configuration from {}", file_name))?;

        Ok(Configuration { config })
    }

    /// Coordinator settings from the `coordinator` table, defaults if absent
    pub fn coordinator_config(&self) -> anyhow::Result<CoordinatorConfig> {
        let config = match self.config.get::<CoordinatorConfig>("coordinator") {
            Ok(config) => config,
            Err(ConfigError::NotFound(_)) => CoordinatorConfig::default(),
            Err(e) => return Err(e).context("invalid coordinator configuration"),
        }
        .normalized();

        config.validate()?;
        Ok(config)
    }

    /// Logging settings: `CASMUTEX_LOG_*` variables, then the `log` table
    pub fn logging_config(&self) -> LoggingConfig {
        let mut logging = LoggingConfig::from_env();

        if let Ok(level) = self.config.get_string("log.level") {
            logging.level = level;
        }
        if let Ok(dir) = self.config.get_string("log.dir") {
            logging.log_dir = Some(dir.into());
        }
        if let Ok(console) = self.config.get_bool("log.console") {
            logging.console_output = console;
        }

        logging
    }
}
