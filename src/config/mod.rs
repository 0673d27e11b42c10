//! Configuration models for the scheduler and its task-set backend.

pub mod scheduler;

pub use scheduler::{SchedulerConfig, TaskSetBackend};
