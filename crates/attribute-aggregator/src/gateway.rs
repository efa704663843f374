// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Entry point for the transport layer.
//!
//! [`SubmissionGateway::submit`] places a batch on the bounded queue shared by
//! the workers. When the queue is full it waits at most the configured
//! timeout, so producers get a bounded worst-case latency instead of either
//! blocking forever or losing batches silently.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::errors::SubmitError;
use crate::model::Batch;

/// Cheap to clone; every transport task can hold its own copy.
#[derive(Clone, Debug)]
pub struct SubmissionGateway {
    tx: flume::Sender<Batch>,
    timeout: Duration,
    cancel_token: CancellationToken,
}

impl SubmissionGateway {
    #[must_use]
    pub fn new(
        tx: flume::Sender<Batch>,
        timeout: Duration,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            tx,
            timeout,
            cancel_token,
        }
    }

    /// Queues `batch` for aggregation.
    ///
    /// # Errors
    ///
    /// - [`SubmitError::ShuttingDown`] once the engine started stopping. This
    ///   is checked before anything is queued.
    /// - [`SubmitError::NoCapacity`] when the queue stayed full for the whole
    ///   timeout.
    pub async fn submit(&self, batch: Batch) -> Result<(), SubmitError> {
        if self.cancel_token.is_cancelled() {
            return Err(SubmitError::ShuttingDown);
        }

        let records = batch.record_count();
        tokio::select! {
            biased;
            () = self.cancel_token.cancelled() => Err(SubmitError::ShuttingDown),
            sent = tokio::time::timeout(self.timeout, self.tx.send_async(batch)) => match sent {
                Ok(Ok(())) => {
                    trace!("Queued batch of {records} records");
                    Ok(())
                }
                // Every worker is gone
                Ok(Err(_)) => Err(SubmitError::ShuttingDown),
                Err(_) => Err(SubmitError::NoCapacity(self.timeout)),
            },
        }
    }

    /// Batches waiting to be picked up by a worker.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.tx.len()
    }

    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn gateway(capacity: usize, timeout: Duration) -> (SubmissionGateway, flume::Receiver<Batch>) {
        let (tx, rx) = flume::bounded(capacity);
        (
            SubmissionGateway::new(tx, timeout, CancellationToken::new()),
            rx,
        )
    }

    #[tokio::test]
    async fn test_submit_queues_batch() {
        let (gateway, rx) = gateway(2, Duration::from_millis(50));
        gateway.submit(Batch::default()).await.unwrap();

        assert_eq!(gateway.queued(), 1);
        assert_eq!(rx.recv_async().await.unwrap(), Batch::default());
    }

    #[tokio::test]
    async fn test_full_queue_times_out() {
        let timeout = Duration::from_millis(100);
        let (gateway, _rx) = gateway(1, timeout);
        gateway.submit(Batch::default()).await.unwrap();

        let started = Instant::now();
        let result = gateway.submit(Batch::default()).await;
        let elapsed = started.elapsed();

        assert_eq!(result, Err(SubmitError::NoCapacity(timeout)));
        assert!(elapsed >= timeout);
        assert!(elapsed < timeout + Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_waiting_submit_succeeds_when_capacity_frees() {
        let (gateway, rx) = gateway(1, Duration::from_secs(5));
        gateway.submit(Batch::default()).await.unwrap();

        let consumer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            rx.recv_async().await.unwrap();
            rx
        });

        gateway.submit(Batch::default()).await.unwrap();
        let _rx = consumer.await.unwrap();
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_fails_fast() {
        let (tx, _rx) = flume::bounded(1);
        let cancel_token = CancellationToken::new();
        let gateway = SubmissionGateway::new(tx, Duration::from_secs(5), cancel_token.clone());

        cancel_token.cancel();
        assert!(gateway.is_shutting_down());
        assert_eq!(
            gateway.submit(Batch::default()).await,
            Err(SubmitError::ShuttingDown)
        );
        assert_eq!(gateway.queued(), 0);
    }

    #[tokio::test]
    async fn test_blocked_submit_observes_shutdown() {
        let (tx, _rx) = flume::bounded(1);
        let cancel_token = CancellationToken::new();
        let gateway = SubmissionGateway::new(tx, Duration::from_secs(30), cancel_token.clone());
        gateway.submit(Batch::default()).await.unwrap();

        let blocked = {
            let gateway = gateway.clone();
            tokio::spawn(async move { gateway.submit(Batch::default()).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel_token.cancel();

        let result = tokio::time::timeout(Duration::from_secs(1), blocked)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result, Err(SubmitError::ShuttingDown));
    }

    #[tokio::test]
    async fn test_disconnected_queue_is_shutting_down() {
        let (gateway, rx) = gateway(1, Duration::from_secs(1));
        drop(rx);

        assert_eq!(
            gateway.submit(Batch::default()).await,
            Err(SubmitError::ShuttingDown)
        );
    }
}
