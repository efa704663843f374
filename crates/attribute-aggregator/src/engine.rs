// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Lifecycle of the aggregation pipeline.
//!
//! [`AttributeEngine::start`] wires every component together and spawns one
//! task per worker plus the flush coordinator and the reconciler:
//!
//! ```text
//!   submit ──> SubmissionGateway ──> queue (flume, bounded)
//!                                      │
//!                    ┌─────────────────┼─────────────────┐
//!                    v                 v                 v
//!                 Worker 0          Worker 1   ...    Worker N
//!                    ^                 ^                 ^
//!                    └──── FlushCoordinator (ticks) ─────┘
//!                    │                 │                 │
//!                    └────> ReconcilerService <──────────┘
//!                                      │
//!                                      v
//!                                  ReportSink
//! ```
//!
//! Stopping happens in two phases. The first cancellation token stops the
//! gateway, the coordinator and the workers; once they are joined, a second
//! token stops the reconciler, so any final flush still has a receiver.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::errors::{EngineError, SubmitError};
use crate::flush_coordinator::FlushCoordinator;
use crate::gateway::SubmissionGateway;
use crate::model::Batch;
use crate::reconciler::ReconcilerService;
use crate::report::ReportSink;
use crate::worker::Worker;

/// Status of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    /// Tasks are running and batches are accepted.
    Running,
    /// Shutdown was signalled but not every task has been joined yet.
    ///
    /// `stop` borrows the engine mutably, so this is only observed after a
    /// `stop` future was dropped before completing. Calling `stop` again
    /// resumes joining the remaining tasks.
    Stopping,
    /// Every task has exited.
    Stopped,
}

pub struct AttributeEngine {
    gateway: SubmissionGateway,
    status: EngineStatus,
    shutdown_token: CancellationToken,
    reconciler_token: CancellationToken,
    /// Workers and the flush coordinator, joined before the reconciler
    tasks: Vec<(String, JoinHandle<()>)>,
    reconciler: Option<JoinHandle<()>>,
}

impl AttributeEngine {
    /// Validates `config` and spawns the pipeline on the current Tokio
    /// runtime. Returns as soon as every task is spawned.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] when `config` does not validate.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a Tokio runtime.
    pub fn start(config: &Config, sink: Arc<dyn ReportSink>) -> Result<Self, EngineError> {
        config.validate()?;

        let shutdown_token = CancellationToken::new();
        let reconciler_token = CancellationToken::new();

        let (reconciler_service, intake) = ReconcilerService::new(
            config.window_close,
            config.worker_count,
            config.window_size,
            config.flush_intake_capacity,
            sink,
            config.flush_on_shutdown,
            reconciler_token.clone(),
        );
        let reconciler = tokio::spawn(reconciler_service.run());

        let (coordinator, flush_receivers) = FlushCoordinator::new(
            config.window_size,
            config.worker_count,
            shutdown_token.clone(),
        );
        let coordinator = tokio::spawn(coordinator.run());

        let (tx, rx) = flume::bounded(config.queue_capacity);
        let attribute_name: Arc<str> = Arc::from(config.attribute_name.as_str());

        let workers = flush_receivers
            .into_iter()
            .enumerate()
            .map(|(id, flush_rx)| {
                let worker = Worker::new(
                    id,
                    Arc::clone(&attribute_name),
                    rx.clone(),
                    flush_rx,
                    intake.clone(),
                    config.flush_on_shutdown,
                    shutdown_token.clone(),
                );
                (format!("worker {id}"), tokio::spawn(worker.run()))
            });
        let tasks = std::iter::once(("flush coordinator".to_string(), coordinator))
            .chain(workers)
            .collect();

        let gateway = SubmissionGateway::new(tx, config.submit_timeout, shutdown_token.clone());

        info!(
            "Attribute engine started: attribute '{}', {} workers, window {:?}, close rule {:?}",
            config.attribute_name, config.worker_count, config.window_size, config.window_close
        );

        Ok(Self {
            gateway,
            status: EngineStatus::Running,
            shutdown_token,
            reconciler_token,
            tasks,
            reconciler: Some(reconciler),
        })
    }

    /// A gateway for transport tasks. It keeps reporting
    /// [`SubmitError::ShuttingDown`] after the engine stopped.
    #[must_use]
    pub fn gateway(&self) -> SubmissionGateway {
        self.gateway.clone()
    }

    /// Shorthand for [`SubmissionGateway::submit`].
    ///
    /// # Errors
    ///
    /// See [`SubmissionGateway::submit`].
    pub async fn submit(&self, batch: Batch) -> Result<(), SubmitError> {
        self.gateway.submit(batch).await
    }

    #[must_use]
    pub fn status(&self) -> EngineStatus {
        self.status
    }

    /// Stops every task and waits for all of them to exit. Calling it again
    /// after it returned is a no-op.
    ///
    /// Cancel safe: a handle is only released once its task was joined, so a
    /// dropped `stop` future leaves the engine in [`EngineStatus::Stopping`]
    /// and the next call finishes the job.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::TaskFailed`] when a task panicked. The
    /// remaining tasks are still joined and the engine ends up stopped.
    pub async fn stop(&mut self) -> Result<(), EngineError> {
        if self.status == EngineStatus::Stopped {
            return Ok(());
        }

        debug!("Stopping attribute engine");
        self.status = EngineStatus::Stopping;
        self.shutdown_token.cancel();

        let mut failure = None;
        while let Some((name, handle)) = self.tasks.last_mut() {
            if let Err(e) = handle.await {
                error!("Attribute engine {name} failed: {e}");
                failure.get_or_insert(EngineError::TaskFailed(format!("{name}: {e}")));
            }
            self.tasks.pop();
        }

        // Only now, so final flushes from the workers are still received
        self.reconciler_token.cancel();
        if let Some(handle) = self.reconciler.as_mut() {
            if let Err(e) = handle.await {
                error!("Attribute engine reconciler failed: {e}");
                failure.get_or_insert(EngineError::TaskFailed(format!("reconciler: {e}")));
            }
            self.reconciler = None;
        }

        self.status = EngineStatus::Stopped;
        info!("Attribute engine stopped");

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for AttributeEngine {
    fn drop(&mut self) {
        self.shutdown_token.cancel();
        self.reconciler_token.cancel();
    }
}
