// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Window reports and where they go.

use std::collections::BTreeMap;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::extractor::AttributeValue;

/// Why a window was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// Every worker's partial aggregate arrived.
    AllWorkersFlushed,
    /// The reconciler's window timer fired.
    Timer,
    /// Final report produced while stopping.
    Shutdown,
}

/// Distinct-message counts for one closed window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowReport {
    /// Zero-based sequence number of the window
    pub window: u64,
    pub reason: CloseReason,
    /// Partial aggregates merged into this window
    pub partials: usize,
    pub counts: BTreeMap<AttributeValue, usize>,
}

impl WindowReport {
    /// Count for `value`, zero when it did not appear in the window.
    #[must_use]
    pub fn count(&self, value: &str) -> usize {
        self.counts.get(value).copied().unwrap_or(0)
    }
}

/// Destination of window reports. Called from the reconciler task, so
/// implementations must not block for long.
pub trait ReportSink: Send + Sync {
    fn emit(&self, report: &WindowReport);
}

/// Writes each report as one structured log line.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReportSink;

impl ReportSink for LogReportSink {
    fn emit(&self, report: &WindowReport) {
        match serde_json::to_string(&report.counts) {
            Ok(counts) => info!(
                window = report.window,
                reason = ?report.reason,
                partials = report.partials,
                values = report.counts.len(),
                "Window report {counts}"
            ),
            Err(e) => error!("Failed to serialize window report {}: {e}", report.window),
        }
    }
}

/// Forwards reports to a channel, for embedders that consume them directly.
#[derive(Debug, Clone)]
pub struct ChannelReportSink {
    tx: mpsc::UnboundedSender<WindowReport>,
}

impl ChannelReportSink {
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<WindowReport>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ReportSink for ChannelReportSink {
    fn emit(&self, report: &WindowReport) {
        if self.tx.send(report.clone()).is_err() {
            debug!("Report receiver dropped, discarding window {}", report.window);
        }
    }
}
