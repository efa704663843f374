// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::process;
use std::sync::Arc;

use tracing::{debug, error, info};
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

use attribute_aggregator::constants::DEFAULT_LOG_LEVEL;
use attribute_aggregator::logger::Formatter;
use attribute_aggregator::{AttributeEngine, Config, LogReportSink};

#[tokio::main]
pub async fn main() {
    let config = Config::from_env();

    // Logging has to exist before a configuration error can be reported
    let log_level = config
        .as_ref()
        .map_or(DEFAULT_LOG_LEVEL, |config| config.log_level.as_str());

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(env_filter(log_level).expect("could not parse log level in configuration"))
        .event_format(Formatter)
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration, shutting down log processor: {e}");
            process::exit(1);
        }
    };

    let mut engine = match AttributeEngine::start(&config, Arc::new(LogReportSink)) {
        Ok(engine) => engine,
        Err(e) => {
            error!("Unable to start attribute engine: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Unable to listen for shutdown signal: {e}");
    }
    info!("Shutdown signal received, stopping log processor");

    if let Err(e) = engine.stop().await {
        error!("Log processor did not stop cleanly: {e}");
        process::exit(1);
    }
}

/// Filter built from the configured level alone.
fn env_filter(log_level: &str) -> Result<EnvFilter, ParseError> {
    EnvFilter::try_new(log_level)
}
