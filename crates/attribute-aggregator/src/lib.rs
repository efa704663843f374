// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # Attribute Aggregator
//!
//! Counts, per value of one configured log attribute, how many distinct log
//! messages carried that value during a time window.
//!
//! ## Architecture
//!
//! - [`gateway`]: bounded, time-limited submission of decoded batches
//! - [`extractor`] and [`stringify`]: attribute resolution across the
//!   resource, scope and record levels, plus message identities
//! - [`worker`]: a pool of tasks, each owning a private [`aggregate`]
//! - [`flush_coordinator`]: periodic flush signal to every worker
//! - [`reconciler`]: merges partial aggregates and emits [`report`]s
//! - [`engine`]: start and stop of the whole pipeline
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use attribute_aggregator::{AttributeEngine, Batch, Config, LogReportSink};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::for_attribute("tenant.id");
//! let mut engine = AttributeEngine::start(&config, Arc::new(LogReportSink))?;
//!
//! engine.submit(Batch::default()).await?;
//!
//! engine.stop().await?;
//! # Ok(())
//! # }
//! ```

#![deny(clippy::all)]
#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]
#![deny(unused_extern_crates)]
#![deny(missing_copy_implementations)]

pub mod aggregate;
pub mod config;
pub mod constants;
pub mod engine;
pub mod errors;
pub mod extractor;
pub mod flush_coordinator;
pub mod gateway;

/// `LOG_PROCESSOR |` log line formatter
pub mod logger;
pub mod model;
pub mod reconciler;
pub mod report;
pub mod stringify;
pub mod worker;

pub use aggregate::AttributeAggregate;
pub use config::{Config, WindowCloseRule};
pub use engine::{AttributeEngine, EngineStatus};
pub use errors::{ConfigError, EngineError, SubmitError};
pub use extractor::{AttributeValue, MessageIdentity, Occurrence};
pub use gateway::SubmissionGateway;
pub use model::{AnyValue, Batch};
pub use report::{ChannelReportSink, CloseReason, LogReportSink, ReportSink, WindowReport};
