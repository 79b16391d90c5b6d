//! rabbitmq-collectd - RabbitMQ stats collector for collectd
//!
//! This binary plays the scheduler role: configuration is parsed once, one
//! isolated client/engine is built per configured broker, and a `read`
//! cycle runs on every tick, dispatching PUTVAL lines on stdout.

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use rabbitmq_collectd::cli::Cli;
use rabbitmq_collectd::config::Config;
use rabbitmq_collectd::dispatch::{Dispatcher, PutvalSink};
use rabbitmq_collectd::engine::StatsEngine;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Cli::parse();

    // Initialize logging
    rabbitmq_collectd::init_logging(&args.log_level.to_string())?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting rabbitmq-collectd"
    );

    // Load configuration and resolve every broker block
    let config = Config::load_or_default(&args.config)?;
    let poll_configs = config.poll_configs()?;
    let interval_secs = args.interval.unwrap_or(config.interval_secs).max(1);

    if args.validate {
        println!("Configuration is valid: {} broker(s)", poll_configs.len());
        return Ok(());
    }

    // One isolated engine per broker, built once and reused for the
    // process lifetime.
    let mut engines = Vec::with_capacity(poll_configs.len());
    for poll_config in &poll_configs {
        info!(
            broker = %poll_config.connection.base_url(),
            "Configured broker"
        );
        engines.push(StatsEngine::new(poll_config)?);
    }

    let mut dispatcher = Dispatcher::new(PutvalSink::new(std::io::stdout(), interval_secs));

    if args.oneshot {
        for engine in &engines {
            engine.read(&mut dispatcher).await;
        }
        info!(
            dispatched = dispatcher.dispatched(),
            dropped = dispatcher.dropped(),
            "Poll cycle complete"
        );
        return Ok(());
    }

    // Brokers are polled sequentially on every tick; overlapping cycles
    // are never started.
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    loop {
        ticker.tick().await;
        for engine in &engines {
            engine.read(&mut dispatcher).await;
        }
    }
}
