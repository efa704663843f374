// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

/// Prefix shared by every environment variable the processor reads.
pub const ENV_PREFIX: &str = "LOG_PROCESSOR_";

pub const DEFAULT_WORKER_COUNT: usize = 5;

/// Window size in seconds.
pub const DEFAULT_WINDOW_SIZE_SECS: u64 = 1000;

pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// How long `submit` waits for queue capacity before giving up.
pub const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Flushed partial aggregates the reconciler can buffer, per worker.
pub const FLUSH_INTAKE_SLOTS_PER_WORKER: usize = 2;

pub const DEFAULT_LOG_LEVEL: &str = "info";

pub const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
