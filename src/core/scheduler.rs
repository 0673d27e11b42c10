//! The task scheduler: one task set, one worker loop, schedule and cancel
//! operations per obligation kind.
//!
//! Producer threads (transaction lifecycle code, recovery bootstrap, pool
//! maintenance) schedule and cancel obligations; a single dedicated worker
//! thread scans the task set on a fixed tick, fires due effects, and retires
//! them. Failures inside an effect are logged and contained per task.
//!
//! # Design
//!
//! - **At-most-once execution**: a fired task is retired whether its effect
//!   succeeded or failed; re-attempts are the effect's own business
//! - **Cooperative cancellation**: a cancel that races a pass which already
//!   snapshotted the task does not abort the in-flight execution, it only
//!   prevents future ones
//! - **Bounded shutdown**: the first `shutdown` call wakes the worker and
//!   waits up to the grace period through a helper thread, never longer

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;
use crate::util::clock;

use super::error::SchedulerError;
use super::subject::{Recoverer, ShrinkablePool, SubjectId, TimeoutTarget};
use super::task::{Task, TaskEffect};
use super::task_set::{build_task_set, TaskSet};

/// Statistics about scheduler activity.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStats {
    /// Tasks currently queued.
    pub queued_tasks: usize,

    /// Total schedule calls accepted, re-schedules included.
    pub scheduled_tasks: u64,

    /// Queued tasks discarded because their subject was re-scheduled.
    pub superseded_tasks: u64,

    /// Queued tasks removed by an explicit cancel.
    pub cancelled_tasks: u64,

    /// Effects invoked, successes and failures alike.
    pub executed_tasks: u64,

    /// Effects that returned an error. Contained, never retried.
    pub failed_tasks: u64,
}

/// Internal counters for scheduler statistics (thread-safe).
#[derive(Debug, Default)]
struct SchedulerCounters {
    scheduled_tasks: AtomicU64,
    superseded_tasks: AtomicU64,
    cancelled_tasks: AtomicU64,
    executed_tasks: AtomicU64,
    failed_tasks: AtomicU64,
}

impl SchedulerCounters {
    fn snapshot(&self, queued_tasks: usize) -> SchedulerStats {
        SchedulerStats {
            queued_tasks,
            scheduled_tasks: self.scheduled_tasks.load(Ordering::Relaxed),
            superseded_tasks: self.superseded_tasks.load(Ordering::Relaxed),
            cancelled_tasks: self.cancelled_tasks.load(Ordering::Relaxed),
            executed_tasks: self.executed_tasks.load(Ordering::Relaxed),
            failed_tasks: self.failed_tasks.load(Ordering::Relaxed),
        }
    }
}

/// Lifecycle flag and pause signal shared with the worker thread.
///
/// The flag lives inside the mutex so the one-shot decision in
/// `begin_shutdown` and the worker's pause are ordered by the same lock.
#[derive(Debug, Default)]
struct WorkerGate {
    stopping: Mutex<bool>,
    wake: Condvar,
}

impl WorkerGate {
    fn is_stopping(&self) -> bool {
        *self.stopping.lock()
    }

    /// Sleep up to `tick`, waking early when shutdown is signalled. Returns
    /// whether the scheduler is stopping.
    fn pause(&self, tick: Duration) -> bool {
        let mut stopping = self.stopping.lock();
        if *stopping {
            return true;
        }
        let _ = self.wake.wait_for(&mut stopping, tick);
        *stopping
    }

    /// Flip the lifecycle flag to stopping and wake the worker. Returns
    /// whether this call performed the transition.
    fn begin_shutdown(&self) -> bool {
        let mut stopping = self.stopping.lock();
        let first = !*stopping;
        *stopping = true;
        drop(stopping);
        self.wake.notify_all();
        first
    }
}

/// State shared between the public handle and the worker thread.
struct Inner {
    tasks: Box<dyn TaskSet>,
    gate: WorkerGate,
    counters: SchedulerCounters,
    seq: AtomicU64,
    tick: Duration,
}

impl Inner {
    fn add_task(&self, execution_time: SystemTime, subject: SubjectId, effect: TaskEffect) {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let kind = effect.kind();
        let task = Arc::new(Task::new(execution_time, seq, subject, effect));

        let superseded = self.tasks.insert(task);
        self.counters.scheduled_tasks.fetch_add(1, Ordering::Relaxed);
        if superseded {
            self.counters.superseded_tasks.fetch_add(1, Ordering::Relaxed);
        }

        debug!(
            kind = kind,
            subject = ?subject,
            superseded = superseded,
            queued = self.tasks.len(),
            "scheduled task"
        );
    }

    fn cancel(&self, subject: SubjectId, kind: &'static str) -> bool {
        let found = self.tasks.remove_by_subject(subject);
        if found {
            self.counters.cancelled_tasks.fetch_add(1, Ordering::Relaxed);
            debug!(
                kind = kind,
                subject = ?subject,
                queued = self.tasks.len(),
                "cancelled task"
            );
        } else {
            debug!(kind = kind, subject = ?subject, "no queued task for subject");
        }
        found
    }

    /// One scan pass. Effects run outside any task-set lock, so producers
    /// never wait on a slow effect and effects may re-schedule through the
    /// scheduler without deadlocking.
    fn execute_elapsed_tasks(&self) {
        if self.tasks.is_empty() {
            return;
        }

        let now = clock::now();
        let mut fired: Vec<Arc<Task>> = Vec::new();

        for task in self.tasks.snapshot() {
            if task.execution_time() > now {
                // The snapshot is time-ordered; nothing further is due.
                break;
            }

            debug!(kind = task.kind(), subject = ?task.subject(), "running task");
            self.counters.executed_tasks.fetch_add(1, Ordering::Relaxed);
            match task.effect().run() {
                Ok(()) => {
                    debug!(kind = task.kind(), subject = ?task.subject(), "task finished");
                }
                Err(err) => {
                    self.counters.failed_tasks.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        kind = task.kind(),
                        subject = ?task.subject(),
                        "error running task: {err:#}"
                    );
                }
            }

            if let TaskEffect::PoolShrink(pool) = task.effect() {
                self.reschedule_pool_shrink(pool, task.subject());
            }

            fired.push(task);
        }

        for task in &fired {
            self.tasks.remove(task);
        }
    }

    /// Pool maintenance is periodic: after a shrink fires, queue the next
    /// one from the pool's own schedule, as long as the pool is alive to
    /// supply one.
    fn reschedule_pool_shrink(&self, pool: &Weak<dyn ShrinkablePool>, subject: SubjectId) {
        let Some(live) = pool.upgrade() else {
            return;
        };
        let Some(next) = live.next_shrink_at() else {
            debug!(subject = ?subject, "pool supplies no further shrink time");
            return;
        };
        self.add_task(next, subject, TaskEffect::PoolShrink(Weak::clone(pool)));
    }
}

/// The worker loop: scan, fire due effects, retire them, pause one tick.
fn run_worker(inner: &Inner) {
    debug!("scheduler worker started");
    loop {
        if inner.gate.is_stopping() {
            break;
        }
        inner.execute_elapsed_tasks();
        if inner.gate.pause(inner.tick) {
            break;
        }
    }
    debug!("scheduler worker exiting");
}

/// The single authority over timed obligations.
///
/// Owns the task set and one background worker thread. Producer threads call
/// the schedule and cancel operations; the worker fires due effects on a
/// fixed tick. Re-scheduling a subject that already has a queued task
/// atomically supersedes the old task, so a subject never owns two queued
/// obligations at once, regardless of kind.
///
/// Schedule calls made after shutdown are accepted but may never run; the
/// host process is expected to be tearing down at that point.
pub struct TaskScheduler {
    inner: Arc<Inner>,

    /// Worker thread handle, taken by the first successful shutdown.
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TaskScheduler {
    /// Create a scheduler and start its background worker thread.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidConfig`] when the configuration does
    /// not validate, or [`SchedulerError::WorkerSpawn`] when the worker
    /// thread could not be started.
    pub fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        config.validate().map_err(SchedulerError::InvalidConfig)?;

        let inner = Arc::new(Inner {
            tasks: build_task_set(config.task_set),
            gate: WorkerGate::default(),
            counters: SchedulerCounters::default(),
            seq: AtomicU64::new(0),
            tick: config.tick_interval(),
        });

        let worker = {
            let inner = Arc::clone(&inner);
            thread::Builder::new()
                .name("txtimer-scheduler".into())
                .spawn(move || run_worker(&inner))?
        };

        info!(
            tick_interval_ms = config.tick_interval_ms,
            task_set = ?config.task_set,
            "task scheduler started"
        );

        Ok(Self {
            inner,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Queue a timeout obligation for `transaction`, superseding any task
    /// the transaction already has queued.
    pub fn schedule_transaction_timeout<T>(
        &self,
        transaction: &Arc<T>,
        execution_time: SystemTime,
    ) where
        T: TimeoutTarget,
    {
        let handle: Weak<dyn TimeoutTarget> = Arc::downgrade(transaction);
        self.inner.add_task(
            execution_time,
            SubjectId::of(transaction),
            TaskEffect::TransactionTimeout(handle),
        );
    }

    /// Cancel the queued timeout obligation of `transaction`. Absence is not
    /// an error; returns whether a task was cancelled.
    pub fn cancel_transaction_timeout<T>(&self, transaction: &Arc<T>) -> bool
    where
        T: TimeoutTarget,
    {
        self.inner
            .cancel(SubjectId::of(transaction), "transaction timeout")
    }

    /// Queue a recovery obligation for `recoverer`, superseding any task the
    /// recoverer already has queued. The recoverer is typically a
    /// process-wide singleton, so at most one recovery task is ever queued.
    pub fn schedule_recovery<R>(&self, recoverer: &Arc<R>, execution_time: SystemTime)
    where
        R: Recoverer,
    {
        let handle: Weak<dyn Recoverer> = Arc::downgrade(recoverer);
        self.inner.add_task(
            execution_time,
            SubjectId::of(recoverer),
            TaskEffect::Recovery(handle),
        );
    }

    /// Cancel the queued recovery obligation of `recoverer`. Absence is not
    /// an error; returns whether a task was cancelled.
    pub fn cancel_recovery<R>(&self, recoverer: &Arc<R>) -> bool
    where
        R: Recoverer,
    {
        self.inner.cancel(SubjectId::of(recoverer), "recovery")
    }

    /// Queue a pool-shrink obligation for `pool`. The execution time is
    /// supplied by the pool itself, not by the caller.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidArgument`] when the pool supplies no
    /// next shrink time.
    pub fn schedule_pool_shrink<P>(&self, pool: &Arc<P>) -> Result<(), SchedulerError>
    where
        P: ShrinkablePool,
    {
        let execution_time = pool.next_shrink_at().ok_or_else(|| {
            SchedulerError::InvalidArgument("pool supplied no next shrink time".into())
        })?;
        let handle: Weak<dyn ShrinkablePool> = Arc::downgrade(pool);
        self.inner.add_task(
            execution_time,
            SubjectId::of(pool),
            TaskEffect::PoolShrink(handle),
        );
        Ok(())
    }

    /// Cancel the queued pool-shrink obligation of `pool`. Absence is not an
    /// error; returns whether a task was cancelled.
    pub fn cancel_pool_shrink<P>(&self, pool: &Arc<P>) -> bool
    where
        P: ShrinkablePool,
    {
        self.inner.cancel(SubjectId::of(pool), "pool shrink")
    }

    /// Number of currently queued tasks.
    #[must_use]
    pub fn queued_tasks(&self) -> usize {
        self.inner.tasks.len()
    }

    /// A snapshot of scheduler activity.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        self.inner.counters.snapshot(self.inner.tasks.len())
    }

    /// Stop the worker and wait up to `grace` for it to exit.
    ///
    /// One-shot and idempotent: the first caller performs the transition and
    /// blocks up to `grace`; every later call returns immediately. A worker
    /// that does not exit in time is detached with a warning, never an
    /// error; the host process owns final teardown.
    pub fn shutdown(&self, grace: Duration) {
        if !self.inner.gate.begin_shutdown() {
            return; // already shut down
        }

        info!("shutting down task scheduler");

        let Some(worker) = self.worker.lock().take() else {
            return;
        };

        // Join with a bound: a helper thread performs the join and reports
        // through a channel, so this call can give up after `grace` without
        // being pinned to the worker.
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        thread::spawn(move || {
            let _ = done_tx.send(worker.join().is_ok());
        });

        match done_rx.recv_timeout(grace) {
            Ok(true) => debug!("scheduler worker exited cleanly"),
            Ok(false) => warn!("scheduler worker panicked before exiting"),
            Err(_) => warn!(
                grace = ?grace,
                "scheduler worker did not exit within the grace period - detaching"
            ),
        }
    }
}

impl Drop for TaskScheduler {
    fn drop(&mut self) {
        // Signal shutdown but do not join: explicit shutdown() is the
        // graceful path, and a scheduler may be dropped while an effect is
        // still in flight.
        if self.inner.gate.begin_shutdown() {
            debug!("task scheduler dropped without explicit shutdown - worker will be detached");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_one_shot() {
        let gate = WorkerGate::default();
        assert!(!gate.is_stopping());
        assert!(gate.begin_shutdown());
        assert!(!gate.begin_shutdown());
        assert!(gate.is_stopping());
    }

    #[test]
    fn test_pause_after_stop() {
        let gate = WorkerGate::default();
        gate.begin_shutdown();

        let started = std::time::Instant::now();
        assert!(gate.pause(Duration::from_secs(5)));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_counters_snapshot() {
        let counters = SchedulerCounters::default();
        counters.scheduled_tasks.fetch_add(3, Ordering::Relaxed);
        counters.executed_tasks.fetch_add(2, Ordering::Relaxed);
        counters.failed_tasks.fetch_add(1, Ordering::Relaxed);

        let stats = counters.snapshot(2);
        assert_eq!(stats.queued_tasks, 2);
        assert_eq!(stats.scheduled_tasks, 3);
        assert_eq!(stats.executed_tasks, 2);
        assert_eq!(stats.failed_tasks, 1);
        assert_eq!(stats.superseded_tasks, 0);
        assert_eq!(stats.cancelled_tasks, 0);
    }
}
