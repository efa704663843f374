// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Periodic flush fan-out.
//!
//! Each worker gets a one-slot signal channel. A tick offers one flush signal
//! to every worker without waiting; a worker whose slot is still occupied
//! simply carries its data into the next flush.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

pub struct FlushCoordinator {
    period: Duration,
    workers: Vec<mpsc::Sender<()>>,
    cancel_token: CancellationToken,
}

impl FlushCoordinator {
    /// Returns the coordinator and one flush receiver per worker.
    #[must_use]
    pub fn new(
        period: Duration,
        worker_count: usize,
        cancel_token: CancellationToken,
    ) -> (Self, Vec<mpsc::Receiver<()>>) {
        let (workers, receivers): (Vec<_>, Vec<_>) =
            (0..worker_count).map(|_| mpsc::channel(1)).unzip();

        let coordinator = Self {
            period,
            workers,
            cancel_token,
        };

        (coordinator, receivers)
    }

    /// Offers a flush signal to every worker. Returns how many accepted it.
    pub fn broadcast(&self) -> usize {
        let mut delivered = 0;
        for (id, worker) in self.workers.iter().enumerate() {
            match worker.try_send(()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(())) => {
                    trace!("Worker {id} has a pending flush, skipping this tick");
                }
                Err(TrySendError::Closed(())) => {
                    trace!("Worker {id} is gone");
                }
            }
        }
        delivered
    }

    pub async fn run(self) {
        debug!("Flush coordinator started, period {:?}", self.period);

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await; // discard first tick, which is instantaneous

        loop {
            tokio::select! {
                biased;
                () = self.cancel_token.cancelled() => break,
                _ = ticker.tick() => {
                    let delivered = self.broadcast();
                    debug!("Flush signal delivered to {}/{} workers", delivered, self.workers.len());
                }
            }
        }

        debug!("Flush coordinator stopped");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    #[test]
    fn test_broadcast_reaches_every_worker_once() {
        let (coordinator, mut receivers) =
            FlushCoordinator::new(Duration::from_secs(1), 3, CancellationToken::new());

        assert_eq!(coordinator.broadcast(), 3);
        // Slots are still occupied, the second tick is skipped everywhere
        assert_eq!(coordinator.broadcast(), 0);

        for rx in &mut receivers {
            assert_eq!(rx.try_recv(), Ok(()));
            assert!(rx.try_recv().is_err());
        }
    }

    #[test]
    fn test_busy_worker_does_not_block_others() {
        let (coordinator, mut receivers) =
            FlushCoordinator::new(Duration::from_secs(1), 2, CancellationToken::new());

        coordinator.broadcast();
        receivers[0].try_recv().unwrap();

        // Worker 1 never consumed its signal
        assert_eq!(coordinator.broadcast(), 1);
        assert!(receivers[0].try_recv().is_ok());
    }

    #[test]
    fn test_dropped_worker_is_skipped() {
        let (coordinator, mut receivers) =
            FlushCoordinator::new(Duration::from_secs(1), 2, CancellationToken::new());
        drop(receivers.remove(1));

        assert_eq!(coordinator.broadcast(), 1);
    }

    #[tokio::test]
    async fn test_ticks_until_cancelled() {
        let cancel_token = CancellationToken::new();
        let (coordinator, mut receivers) =
            FlushCoordinator::new(Duration::from_millis(10), 1, cancel_token.clone());
        let task = tokio::spawn(coordinator.run());

        for _ in 0..3 {
            timeout(Duration::from_secs(1), receivers[0].recv())
                .await
                .unwrap()
                .unwrap();
        }

        cancel_token.cancel();
        timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
        assert!(receivers[0].recv().await.is_none());
    }
}
