// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Merges flushed partial aggregates into windowed reports.
//!
//! ```text
//!   Worker 0 ──┐
//!   Worker 1 ──┼── partial aggregates ──> ReconcilerService ──> ReportSink
//!   Worker N ──┘     (bounded mpsc)        owns Reconciler
//! ```
//!
//! The [`Reconciler`] is plain synchronous state; the [`ReconcilerService`]
//! is the task that feeds it and decides when a window closes.
//!
//! State machine:
//!
//! ```text
//!   Idle ──merge──> Accumulating ──close──> Reporting ──> Accumulating ...
//!     └──────────────────┴──stop──> Stopped
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::aggregate::AttributeAggregate;
use crate::config::WindowCloseRule;
use crate::report::{CloseReason, ReportSink, WindowReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcilerState {
    Idle,
    Accumulating,
    Reporting,
    Stopped,
}

#[derive(Debug)]
pub struct Reconciler {
    window: AttributeAggregate,
    rule: WindowCloseRule,
    expected_partials: usize,
    received_partials: usize,
    next_window: u64,
    state: ReconcilerState,
}

impl Reconciler {
    /// `expected_partials` is the worker count: under
    /// [`WindowCloseRule::ArrivalCount`] a window closes once that many
    /// partial aggregates arrived.
    #[must_use]
    pub fn new(rule: WindowCloseRule, expected_partials: usize) -> Self {
        Self {
            window: AttributeAggregate::new(),
            rule,
            expected_partials: expected_partials.max(1),
            received_partials: 0,
            next_window: 0,
            state: ReconcilerState::Idle,
        }
    }

    #[must_use]
    pub fn state(&self) -> ReconcilerState {
        self.state
    }

    /// Partial aggregates merged since the last close.
    #[must_use]
    pub fn received_partials(&self) -> usize {
        self.received_partials
    }

    /// Current, not yet reported, window contents.
    #[must_use]
    pub fn window(&self) -> &AttributeAggregate {
        &self.window
    }

    /// Merges one partial aggregate. Returns the window's report when this
    /// arrival completes it under [`WindowCloseRule::ArrivalCount`].
    pub fn merge(&mut self, partial: AttributeAggregate) -> Option<WindowReport> {
        if self.state == ReconcilerState::Stopped {
            return None;
        }

        self.state = ReconcilerState::Accumulating;
        self.window.merge(partial);
        self.received_partials += 1;

        if self.rule == WindowCloseRule::ArrivalCount
            && self.received_partials >= self.expected_partials
        {
            return Some(self.close(CloseReason::AllWorkersFlushed));
        }
        None
    }

    /// Snapshots the window into a report and starts an empty one.
    pub fn close(&mut self, reason: CloseReason) -> WindowReport {
        self.state = ReconcilerState::Reporting;

        let window = std::mem::take(&mut self.window);
        let report = WindowReport {
            window: self.next_window,
            reason,
            partials: self.received_partials,
            counts: window.counts(),
        };

        self.next_window += 1;
        self.received_partials = 0;
        self.state = ReconcilerState::Accumulating;
        report
    }

    pub fn stop(&mut self) {
        self.state = ReconcilerState::Stopped;
    }
}

/// Task owning the [`Reconciler`].
pub struct ReconcilerService {
    reconciler: Reconciler,
    rx: mpsc::Receiver<AttributeAggregate>,
    sink: Arc<dyn ReportSink>,
    window_timer: Option<Interval>,
    drain_on_shutdown: bool,
    cancel_token: CancellationToken,
}

impl ReconcilerService {
    /// Returns the service and the sender workers flush into.
    #[must_use]
    pub fn new(
        rule: WindowCloseRule,
        worker_count: usize,
        window_size: Duration,
        intake_capacity: usize,
        sink: Arc<dyn ReportSink>,
        drain_on_shutdown: bool,
        cancel_token: CancellationToken,
    ) -> (Self, mpsc::Sender<AttributeAggregate>) {
        let (tx, rx) = mpsc::channel(intake_capacity.max(1));

        let window_timer = match rule {
            WindowCloseRule::Timer => {
                // Flush ticks fire every window_size from start. Closing half a
                // period after each tick leaves time for its partials to arrive.
                let first_close = Instant::now() + window_size + window_size / 2;
                let mut timer = interval_at(first_close, window_size);
                timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
                Some(timer)
            }
            WindowCloseRule::ArrivalCount => None,
        };

        let service = Self {
            reconciler: Reconciler::new(rule, worker_count),
            rx,
            sink,
            window_timer,
            drain_on_shutdown,
            cancel_token,
        };

        (service, tx)
    }

    pub async fn run(mut self) {
        debug!("Reconciler service started");

        loop {
            tokio::select! {
                biased;
                () = self.cancel_token.cancelled() => {
                    debug!("Reconciler service shutting down");
                    self.finish();
                    break;
                }
                () = next_tick(&mut self.window_timer) => {
                    let report = self.reconciler.close(CloseReason::Timer);
                    self.sink.emit(&report);
                }
                partial = self.rx.recv() => {
                    let Some(partial) = partial else {
                        debug!("All flush senders dropped");
                        self.finish();
                        break;
                    };
                    if let Some(report) = self.reconciler.merge(partial) {
                        self.sink.emit(&report);
                    }
                }
            }
        }

        self.reconciler.stop();
        debug!("Reconciler service stopped");
    }

    /// With draining enabled, merges whatever is still queued and reports
    /// the unfinished window.
    fn finish(&mut self) {
        if !self.drain_on_shutdown {
            return;
        }

        while let Ok(partial) = self.rx.try_recv() {
            if let Some(report) = self.reconciler.merge(partial) {
                self.sink.emit(&report);
            }
        }

        if self.reconciler.received_partials() > 0 {
            let report = self.reconciler.close(CloseReason::Shutdown);
            self.sink.emit(&report);
        }
    }
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending().await,
    }
}
