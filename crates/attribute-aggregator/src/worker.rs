// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Aggregation workers.
//!
//! Every worker owns a private [`AttributeAggregate`] and reacts to three
//! event sources folded into one [`WorkerEvent`]:
//!
//! ```text
//!   submission queue (shared, flume) ──> Batch    ──┐
//!   flush coordinator (per worker)   ──> Flush    ──┼──> Worker::run
//!   cancellation token               ──> Shutdown ──┘
//! ```
//!
//! No worker ever touches another worker's aggregate. On flush the whole
//! aggregate moves to the reconciler and a fresh one takes its place.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::aggregate::AttributeAggregate;
use crate::extractor::extract;
use crate::model::Batch;

#[derive(Debug)]
pub enum WorkerEvent {
    Batch(Batch),
    Flush,
    Shutdown,
}

pub struct Worker {
    id: usize,
    attribute_name: Arc<str>,
    local: AttributeAggregate,
    batches: flume::Receiver<Batch>,
    flush_rx: mpsc::Receiver<()>,
    intake: mpsc::Sender<AttributeAggregate>,
    flush_on_shutdown: bool,
    cancel_token: CancellationToken,
}

impl Worker {
    #[must_use]
    pub fn new(
        id: usize,
        attribute_name: Arc<str>,
        batches: flume::Receiver<Batch>,
        flush_rx: mpsc::Receiver<()>,
        intake: mpsc::Sender<AttributeAggregate>,
        flush_on_shutdown: bool,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            id,
            attribute_name,
            local: AttributeAggregate::new(),
            batches,
            flush_rx,
            intake,
            flush_on_shutdown,
            cancel_token,
        }
    }

    pub async fn run(mut self) {
        debug!("Worker {} started", self.id);

        loop {
            match self.next_event().await {
                WorkerEvent::Batch(batch) => self.aggregate(&batch),
                WorkerEvent::Flush => self.flush(),
                WorkerEvent::Shutdown => {
                    if self.flush_on_shutdown && !self.local.is_empty() {
                        let partial = std::mem::take(&mut self.local);
                        if self.intake.send(partial).await.is_err() {
                            debug!("Worker {}: reconciler gone, final flush dropped", self.id);
                        }
                    }
                    break;
                }
            }
        }

        debug!("Worker {} stopped", self.id);
    }

    /// Waits for the next event. Shutdown wins over flush, and flush wins
    /// over data, so a busy queue cannot starve either signal.
    async fn next_event(&mut self) -> WorkerEvent {
        tokio::select! {
            biased;
            () = self.cancel_token.cancelled() => WorkerEvent::Shutdown,
            Some(()) = self.flush_rx.recv() => WorkerEvent::Flush,
            batch = self.batches.recv_async() => match batch {
                Ok(batch) => WorkerEvent::Batch(batch),
                // Every gateway is gone, nothing more can arrive
                Err(_) => WorkerEvent::Shutdown,
            },
        }
    }

    fn aggregate(&mut self, batch: &Batch) {
        let before = self.local.len();
        self.local.extend(extract(batch, &self.attribute_name));
        trace!(
            "Worker {} aggregated batch of {} records, {} new values",
            self.id,
            batch.record_count(),
            self.local.len() - before
        );
    }

    /// Hands the local aggregate to the reconciler without waiting. If the
    /// intake is full the partial is dropped.
    fn flush(&mut self) {
        let partial = std::mem::take(&mut self.local);
        let values = partial.len();

        match self.intake.try_send(partial) {
            Ok(()) => debug!("Worker {} flushed {} values", self.id, values),
            Err(TrySendError::Full(_)) => {
                warn!(
                    "Worker {}: reconciler intake full, dropped partial aggregate with {} values",
                    self.id, values
                );
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Worker {}: reconciler gone, flush dropped", self.id);
            }
        }
    }
}
