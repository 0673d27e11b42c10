//! Core scheduling abstractions: tasks, the task set, and the scheduler.

pub mod error;
pub mod scheduler;
pub mod subject;
pub mod task;
pub mod task_set;

pub use error::{AppResult, SchedulerError};
pub use scheduler::{SchedulerStats, TaskScheduler};
pub use subject::{Recoverer, ShrinkablePool, SubjectId, TimeoutTarget};
pub use task::{Task, TaskEffect};
pub use task_set::{build_task_set, ConcurrentTaskSet, LockedTaskSet, TaskSet};
