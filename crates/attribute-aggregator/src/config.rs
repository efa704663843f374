// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{
    DEFAULT_LOG_LEVEL, DEFAULT_QUEUE_CAPACITY, DEFAULT_SUBMIT_TIMEOUT, DEFAULT_WINDOW_SIZE_SECS,
    DEFAULT_WORKER_COUNT, ENV_PREFIX, FLUSH_INTAKE_SLOTS_PER_WORKER, VALID_LOG_LEVELS,
};
use crate::errors::ConfigError;

/// When the reconciler closes a window and emits its report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowCloseRule {
    /// Close once as many partial aggregates have arrived as there are
    /// workers. A worker that misses a flush tick delays the close.
    #[default]
    ArrivalCount,
    /// Close on a reconciler-side timer of one window size, whatever arrived.
    Timer,
}

impl FromStr for WindowCloseRule {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "arrivals" | "arrival_count" => Ok(WindowCloseRule::ArrivalCount),
            "timer" => Ok(WindowCloseRule::Timer),
            other => Err(ConfigError::InvalidConfig(format!(
                "Invalid window close rule '{other}'. Must be one of: arrivals, timer"
            ))),
        }
    }
}

/// Static parameters of the aggregation engine, built once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Attribute whose values are counted
    pub attribute_name: String,
    pub worker_count: usize,
    /// Flush period, and window length under [`WindowCloseRule::Timer`]
    pub window_size: Duration,
    /// Capacity of the submission queue shared by the workers
    pub queue_capacity: usize,
    /// Capacity of the reconciler's partial aggregate intake
    pub flush_intake_capacity: usize,
    /// Longest time `submit` waits for queue capacity
    pub submit_timeout: Duration,
    pub window_close: WindowCloseRule,
    /// Hand the last local aggregates to the reconciler on stop
    pub flush_on_shutdown: bool,
    /// Log level (e.g., trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            attribute_name: String::new(),
            worker_count: DEFAULT_WORKER_COUNT,
            window_size: Duration::from_secs(DEFAULT_WINDOW_SIZE_SECS),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            flush_intake_capacity: DEFAULT_WORKER_COUNT * FLUSH_INTAKE_SLOTS_PER_WORKER,
            submit_timeout: DEFAULT_SUBMIT_TIMEOUT,
            window_close: WindowCloseRule::default(),
            flush_on_shutdown: false,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl Config {
    /// Default configuration tracking `attribute_name`.
    pub fn for_attribute(attribute_name: impl Into<String>) -> Self {
        Self {
            attribute_name: attribute_name.into(),
            ..Default::default()
        }
    }

    /// Create configuration from `LOG_PROCESSOR_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable source. Keys are the
    /// full variable names, prefix included.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        let attribute_name = var("ATTRIBUTE_NAME")
            .map(|val| val.trim().to_string())
            .ok_or_else(|| ConfigError::MissingVariable(format!("{ENV_PREFIX}ATTRIBUTE_NAME")))?;
        let worker_count = var("WORKER_COUNT")
            .and_then(|val| val.trim().parse::<usize>().ok())
            .unwrap_or(DEFAULT_WORKER_COUNT);
        let window_size = var("WINDOW_SIZE")
            .and_then(|val| val.trim().parse::<u64>().ok())
            .map_or(Duration::from_secs(DEFAULT_WINDOW_SIZE_SECS), Duration::from_secs);
        let queue_capacity = var("QUEUE_CAPACITY")
            .and_then(|val| val.trim().parse::<usize>().ok())
            .unwrap_or(DEFAULT_QUEUE_CAPACITY);
        let flush_intake_capacity = var("FLUSH_INTAKE_CAPACITY")
            .and_then(|val| val.trim().parse::<usize>().ok())
            .unwrap_or(worker_count.saturating_mul(FLUSH_INTAKE_SLOTS_PER_WORKER));
        let submit_timeout = var("SUBMIT_TIMEOUT_MS")
            .and_then(|val| val.trim().parse::<u64>().ok())
            .map_or(DEFAULT_SUBMIT_TIMEOUT, Duration::from_millis);
        let window_close = match var("WINDOW_CLOSE") {
            Some(val) => val.parse::<WindowCloseRule>()?,
            None => WindowCloseRule::default(),
        };
        let flush_on_shutdown = var("FLUSH_ON_SHUTDOWN")
            .map(|val| val.trim().to_lowercase() == "true")
            .unwrap_or(false);
        let log_level = var("LOG_LEVEL")
            .map(|val| val.trim().to_lowercase())
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

        let config = Self {
            attribute_name,
            worker_count,
            window_size,
            queue_capacity,
            flush_intake_capacity,
            submit_timeout,
            window_close,
            flush_on_shutdown,
            log_level,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.attribute_name.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "attribute name cannot be empty".to_string(),
            ));
        }

        let positive = [
            ("worker count", self.worker_count),
            ("queue capacity", self.queue_capacity),
            ("flush intake capacity", self.flush_intake_capacity),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidConfig(format!(
                    "{name} must be greater than 0"
                )));
            }
        }

        if self.window_size.is_zero() {
            return Err(ConfigError::InvalidConfig(
                "window size must be greater than 0".to_string(),
            ));
        }

        if self.submit_timeout.is_zero() {
            return Err(ConfigError::InvalidConfig(
                "submit timeout must be greater than 0".to_string(),
            ));
        }

        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(ConfigError::InvalidConfig(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config_needs_attribute() {
        assert!(Config::default().validate().is_err());
        assert!(Config::for_attribute("tenant").validate().is_ok());
    }

    #[test]
    fn test_from_lookup_with_defaults() {
        let config =
            Config::from_lookup(lookup_from(&[("LOG_PROCESSOR_ATTRIBUTE_NAME", "tenant")]))
                .unwrap();

        assert_eq!(config.attribute_name, "tenant");
        assert_eq!(config.worker_count, 5);
        assert_eq!(config.window_size, Duration::from_secs(1000));
        assert_eq!(config.queue_capacity, 1000);
        assert_eq!(config.flush_intake_capacity, 10);
        assert_eq!(config.submit_timeout, Duration::from_secs(5));
        assert_eq!(config.window_close, WindowCloseRule::ArrivalCount);
        assert!(!config.flush_on_shutdown);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("LOG_PROCESSOR_ATTRIBUTE_NAME", " service.name "),
            ("LOG_PROCESSOR_WORKER_COUNT", "8"),
            ("LOG_PROCESSOR_WINDOW_SIZE", "60"),
            ("LOG_PROCESSOR_QUEUE_CAPACITY", "64"),
            ("LOG_PROCESSOR_SUBMIT_TIMEOUT_MS", "250"),
            ("LOG_PROCESSOR_WINDOW_CLOSE", "timer"),
            ("LOG_PROCESSOR_FLUSH_ON_SHUTDOWN", "TRUE"),
            ("LOG_PROCESSOR_LOG_LEVEL", "DEBUG"),
        ]))
        .unwrap();

        assert_eq!(config.attribute_name, "service.name");
        assert_eq!(config.worker_count, 8);
        assert_eq!(config.flush_intake_capacity, 16);
        assert_eq!(config.window_size, Duration::from_secs(60));
        assert_eq!(config.queue_capacity, 64);
        assert_eq!(config.submit_timeout, Duration::from_millis(250));
        assert_eq!(config.window_close, WindowCloseRule::Timer);
        assert!(config.flush_on_shutdown);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_missing_attribute_name() {
        let result = Config::from_lookup(lookup_from(&[]));
        assert_eq!(
            result.unwrap_err(),
            ConfigError::MissingVariable("LOG_PROCESSOR_ATTRIBUTE_NAME".to_string())
        );

        let result = Config::from_lookup(lookup_from(&[("LOG_PROCESSOR_ATTRIBUTE_NAME", "  ")]));
        assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
    }

    #[test]
    fn test_unparsable_numbers_fall_back_to_defaults() {
        let config = Config::from_lookup(lookup_from(&[
            ("LOG_PROCESSOR_ATTRIBUTE_NAME", "tenant"),
            ("LOG_PROCESSOR_WORKER_COUNT", "many"),
            ("LOG_PROCESSOR_WINDOW_SIZE", "-1"),
        ]))
        .unwrap();

        assert_eq!(config.worker_count, 5);
        assert_eq!(config.window_size, Duration::from_secs(1000));
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let zero_workers = Config {
            worker_count: 0,
            ..Config::for_attribute("tenant")
        };
        assert!(zero_workers.validate().is_err());

        let zero_window = Config {
            window_size: Duration::ZERO,
            ..Config::for_attribute("tenant")
        };
        assert!(zero_window.validate().is_err());

        let zero_queue = Config {
            queue_capacity: 0,
            ..Config::for_attribute("tenant")
        };
        assert!(zero_queue.validate().is_err());

        let zero_timeout = Config {
            submit_timeout: Duration::ZERO,
            ..Config::for_attribute("tenant")
        };
        assert!(zero_timeout.validate().is_err());
    }

    #[test]
    fn test_invalid_window_close_rule() {
        let result = Config::from_lookup(lookup_from(&[
            ("LOG_PROCESSOR_ATTRIBUTE_NAME", "tenant"),
            ("LOG_PROCESSOR_WINDOW_CLOSE", "whenever"),
        ]));
        assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
        assert_eq!(
            "Arrivals".parse::<WindowCloseRule>().unwrap(),
            WindowCloseRule::ArrivalCount
        );
    }

    #[test]
    fn test_valid_log_levels() {
        for level in VALID_LOG_LEVELS {
            let config = Config {
                log_level: level.to_string(),
                ..Config::for_attribute("tenant")
            };
            assert!(
                config.validate().is_ok(),
                "Log level '{}' should be valid",
                level
            );
        }

        let config = Config {
            log_level: "verbose".to_string(),
            ..Config::for_attribute("tenant")
        };
        assert!(config.validate().is_err());
    }
}
