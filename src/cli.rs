//! CLI argument parsing for rabbitmq-collectd
//!
//! This module provides the command-line interface using clap derive macros.
//!
//! # Options
//!
//! - `--config` / `-c`: Configuration file path (default: config.yaml, env: RMQ_COLLECTD_CONFIG)
//! - `--interval` / `-i`: Seconds between poll cycles (env: RMQ_COLLECTD_INTERVAL)
//! - `--validate`: Validate configuration without polling
//! - `--oneshot`: Run a single poll cycle and exit
//! - `--log-level` / `-l`: Log level (trace/debug/info/warn/error, env: RMQ_COLLECTD_LOG_LEVEL)
//!
//! # Precedence
//!
//! Configuration values are resolved in the following order (highest to
//! lowest priority): CLI arguments, environment variables, configuration
//! file, default values.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// rabbitmq-collectd - RabbitMQ stats collector for collectd
///
/// Polls the RabbitMQ management API on an interval and emits every stat
/// as a collectd exec-plugin PUTVAL line on stdout.
#[derive(Parser, Debug)]
#[command(name = "rabbitmq-collectd")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "config.yaml",
        env = "RMQ_COLLECTD_CONFIG"
    )]
    pub config: PathBuf,

    /// Seconds between poll cycles (overrides config file)
    #[arg(short, long, value_name = "SECONDS", env = "RMQ_COLLECTD_INTERVAL")]
    pub interval: Option<u64>,

    /// Validate configuration without polling
    #[arg(long)]
    pub validate: bool,

    /// Run a single poll cycle and exit
    #[arg(long)]
    pub oneshot: bool,

    /// Log level
    #[arg(
        short,
        long,
        value_enum,
        default_value = "info",
        env = "RMQ_COLLECTD_LOG_LEVEL"
    )]
    pub log_level: LogLevel,
}

/// Log level options
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// Trace level - most verbose
    Trace,
    /// Debug level
    Debug,
    /// Info level - default
    Info,
    /// Warn level
    Warn,
    /// Error level - least verbose
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}
