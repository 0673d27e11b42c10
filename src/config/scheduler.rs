//! Scheduler configuration structures.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default scan cadence: twice per second is plenty for obligations on a
/// minute-to-hour scale.
const DEFAULT_TICK_INTERVAL_MS: u64 = 500;

/// Default bound on the shutdown wait.
const DEFAULT_GRACEFUL_SHUTDOWN_MS: u64 = 60_000;

/// Task-set backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskSetBackend {
    /// Inherently concurrent ordered set (lock-free skip list).
    Concurrent,
    /// Plain ordered set behind a mutex, with defensive copies for
    /// iteration.
    Locked,
}

/// Scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Fixed scan cadence of the worker, in milliseconds.
    pub tick_interval_ms: u64,
    /// How long `shutdown` may block waiting for the worker to exit, in
    /// milliseconds.
    pub graceful_shutdown_ms: u64,
    /// Task-set backend selection.
    pub task_set: TaskSetBackend,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            graceful_shutdown_ms: DEFAULT_GRACEFUL_SHUTDOWN_MS,
            task_set: TaskSetBackend::Concurrent,
        }
    }
}

impl SchedulerConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the worker's scan cadence.
    #[must_use]
    pub fn with_tick_interval(mut self, tick: Duration) -> Self {
        self.tick_interval_ms = u64::try_from(tick.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the bound on the shutdown wait.
    #[must_use]
    pub fn with_graceful_shutdown(mut self, grace: Duration) -> Self {
        self.graceful_shutdown_ms = u64::try_from(grace.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Select the task-set backend.
    #[must_use]
    pub fn with_task_set(mut self, backend: TaskSetBackend) -> Self {
        self.task_set = backend;
        self
    }

    /// The worker's scan cadence.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// The bound on the shutdown wait, as hosts pass it to
    /// `TaskScheduler::shutdown`.
    pub fn graceful_shutdown(&self) -> Duration {
        Duration::from_millis(self.graceful_shutdown_ms)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.tick_interval_ms == 0 {
            return Err("tick_interval_ms must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse a configuration from a JSON string and validate it.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = SchedulerConfig::new();
        assert_eq!(cfg.tick_interval(), Duration::from_millis(500));
        assert_eq!(cfg.graceful_shutdown(), Duration::from_secs(60));
        assert_eq!(cfg.task_set, TaskSetBackend::Concurrent);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_builder_overrides() {
        let cfg = SchedulerConfig::new()
            .with_tick_interval(Duration::from_millis(25))
            .with_graceful_shutdown(Duration::from_secs(5))
            .with_task_set(TaskSetBackend::Locked);

        assert_eq!(cfg.tick_interval_ms, 25);
        assert_eq!(cfg.graceful_shutdown_ms, 5_000);
        assert_eq!(cfg.task_set, TaskSetBackend::Locked);
    }

    #[test]
    fn test_zero_tick_rejected() {
        let cfg = SchedulerConfig::new().with_tick_interval(Duration::ZERO);
        let err = cfg.validate().unwrap_err();
        assert!(err.contains("tick_interval_ms"));
    }

    #[test]
    fn test_json_snake_case() {
        let json = r#"{"tick_interval_ms":250,"graceful_shutdown_ms":5000,"task_set":"locked"}"#;
        let cfg = SchedulerConfig::from_json_str(json).unwrap();
        assert_eq!(cfg.task_set, TaskSetBackend::Locked);
        assert_eq!(cfg.tick_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_json_validates() {
        let json = r#"{"tick_interval_ms":0,"graceful_shutdown_ms":5000,"task_set":"concurrent"}"#;
        let err = SchedulerConfig::from_json_str(json).unwrap_err();
        assert!(err.contains("tick_interval_ms"));
    }

    #[test]
    fn test_json_parse_error() {
        let err = SchedulerConfig::from_json_str("{not json").unwrap_err();
        assert!(err.starts_with("parse error:"));
    }
}
