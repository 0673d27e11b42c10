//! Error types for scheduler operations.

use thiserror::Error;

/// Errors produced by scheduler components.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A schedule operation received an argument it cannot act on.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Configuration validation failed at construction time.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The background worker thread could not be spawned.
    #[error("failed to start scheduler worker: {0}")]
    WorkerSpawn(#[from] std::io::Error),
}

/// Result type for obligation effects. Effect failures are arbitrary
/// collaborator errors that the worker only logs, so they are carried as
/// anyhow chains rather than a closed enum.
pub type AppResult<T> = Result<T, anyhow::Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SchedulerError::InvalidArgument("pool supplied no next shrink time".into());
        assert_eq!(
            err.to_string(),
            "invalid argument: pool supplied no next shrink time"
        );

        let err = SchedulerError::InvalidConfig("tick_interval_ms must be greater than 0".into());
        assert!(err.to_string().starts_with("invalid configuration:"));
    }

    #[test]
    fn test_worker_spawn_from_io() {
        let io = std::io::Error::other("no threads left");
        let err = SchedulerError::from(io);
        assert!(matches!(err, SchedulerError::WorkerSpawn(_)));
        assert!(err.to_string().contains("no threads left"));
    }
}
