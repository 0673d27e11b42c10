//! # Txtimer
//!
//! The timing and maintenance backbone of a distributed (XA/2PC-style)
//! transaction manager.
//!
//! This library tracks the future-dated obligations a transaction manager
//! accumulates and fires them at the right wall-clock moment. A single
//! scheduler owns every pending obligation, guarantees at most one pending
//! obligation per subject, and executes due obligations on a fixed cadence
//! with per-obligation failure isolation.
//!
//! ## Core Problem Solved
//!
//! Transaction managers accumulate timed duties with very different owners:
//!
//! - **Transaction timeouts**: each in-flight transaction must be marked
//!   timed out if it outlives its deadline
//! - **Recovery retries**: the XA recovery scan has to re-run periodically
//!   until the log is clean
//! - **Pool maintenance**: idle connection pools shrink on a schedule the
//!   pool itself decides
//!
//! One misbehaving obligation (a recovery pass that fails, a pool that
//! errors while shrinking) must never stall the others or destabilize the
//! manager.
//!
//! ## Key Features
//!
//! - **Single time-ordered task set**: total order by execution time with a
//!   stable insertion tiebreak
//! - **Uniqueness per subject**: re-scheduling a subject atomically
//!   supersedes its queued task
//! - **Failure containment**: a failing effect is logged and retired without
//!   touching the rest of the pass
//! - **Selectable task-set backend**: an inherently concurrent skip list, or
//!   a mutex-guarded ordered set with defensive copies
//! - **Bounded shutdown**: one-shot, idempotent, waits up to a configured
//!   grace period for the worker to exit
//!
//! ## TaskScheduler - Scheduling Timed Obligations
//!
//! ```rust,ignore
//! use txtimer::config::SchedulerConfig;
//! use txtimer::core::TaskScheduler;
//! use txtimer::util::clock;
//! use std::time::Duration;
//!
//! let config = SchedulerConfig::new()
//!     .with_tick_interval(Duration::from_millis(500))
//!     .with_graceful_shutdown(Duration::from_secs(60));
//! let scheduler = TaskScheduler::new(config.clone())?;
//!
//! // `tx` implements txtimer::core::TimeoutTarget
//! scheduler.schedule_transaction_timeout(&tx, clock::now() + Duration::from_secs(30));
//!
//! // ... transaction commits in time:
//! let cancelled = scheduler.cancel_transaction_timeout(&tx);
//! assert!(cancelled);
//!
//! scheduler.shutdown(config.graceful_shutdown());
//! ```
//!
//! For complete examples, see:
//! - `tests/scheduler_test.rs` - Scheduler lifecycle and ordering tests
//! - `tests/obligation_test.rs` - Per-obligation flows and failure isolation

#![deny(warnings)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling abstractions: tasks, the task set, and the scheduler.
pub mod core;
/// Configuration models for the scheduler and its task-set backend.
pub mod config;
/// Shared utilities.
pub mod util;
