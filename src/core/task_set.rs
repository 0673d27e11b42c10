//! The ordered container of pending obligations, in two flavors.
//!
//! The task set is the only shared mutable resource in this crate. Two
//! implementations satisfy one contract and are selected once at
//! construction: an inherently concurrent skip list for throughput under
//! many producer threads, and a mutex-guarded ordered set with defensive
//! copies as the portable fallback. The scheduler never special-cases which
//! one is active.

use std::collections::BTreeSet;
use std::sync::Arc;

use crossbeam_skiplist::SkipSet;
use parking_lot::Mutex;
use tracing::debug;

use crate::config::TaskSetBackend;

use super::subject::SubjectId;
use super::task::Task;

/// Ordered, shared container of pending tasks.
///
/// Implementations serialize their own compound mutations, so callers never
/// hold an external lock: `insert` and `remove_by_subject` are atomic with
/// respect to each other, which is what keeps a subject from ever owning two
/// queued tasks, even under racing producers.
pub trait TaskSet: Send + Sync {
    /// Queue `task`, discarding any queued task owned by the same subject
    /// first. Returns whether a task was superseded.
    fn insert(&self, task: Arc<Task>) -> bool;

    /// Remove the task owned by `subject`, if any; returns whether one was
    /// found. Identity match only, via an O(n) scan; the set holds tens to
    /// low hundreds of obligations, never more.
    fn remove_by_subject(&self, subject: SubjectId) -> bool;

    /// Retire a specific task once its effect has run. A concurrent
    /// supersession or cancellation may have removed it already, in which
    /// case this is a no-op returning false.
    fn remove(&self, task: &Task) -> bool;

    /// The queued tasks in execution-time order, safe to take while other
    /// threads mutate the live set.
    fn snapshot(&self) -> Vec<Arc<Task>>;

    /// Number of queued tasks.
    fn len(&self) -> usize;

    /// Whether no task is queued.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Inherently concurrent ordered set backed by a lock-free skip list.
///
/// Snapshots iterate the live structure directly (skip-list traversal
/// tolerates concurrent mutation) and the worker's retire-removals are
/// single-element lock-free operations. The `producers` mutex serializes
/// only the compound mutations between producer threads; a pure removal
/// cannot duplicate a subject, so the worker never takes it.
pub struct ConcurrentTaskSet {
    tasks: SkipSet<Arc<Task>>,
    producers: Mutex<()>,
}

impl ConcurrentTaskSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self {
            tasks: SkipSet::new(),
            producers: Mutex::new(()),
        }
    }

    fn remove_subject_serialized(&self, subject: SubjectId) -> bool {
        for entry in self.tasks.iter() {
            if entry.value().subject() == subject {
                return entry.remove();
            }
        }
        false
    }
}

impl Default for ConcurrentTaskSet {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskSet for ConcurrentTaskSet {
    fn insert(&self, task: Arc<Task>) -> bool {
        let _serial = self.producers.lock();
        let superseded = self.remove_subject_serialized(task.subject());
        self.tasks.insert(task);
        superseded
    }

    fn remove_by_subject(&self, subject: SubjectId) -> bool {
        let _serial = self.producers.lock();
        self.remove_subject_serialized(subject)
    }

    fn remove(&self, task: &Task) -> bool {
        self.tasks.remove(task).is_some()
    }

    fn snapshot(&self) -> Vec<Arc<Task>> {
        self.tasks.iter().map(|entry| entry.value().clone()).collect()
    }

    fn len(&self) -> usize {
        self.tasks.len()
    }

    fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Plain ordered set behind a mutex, the portable fallback.
///
/// Every operation takes the lock; `snapshot` hands out a defensive copy so
/// the worker never holds the lock across effect invocations.
pub struct LockedTaskSet {
    tasks: Mutex<BTreeSet<Arc<Task>>>,
}

impl LockedTaskSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(BTreeSet::new()),
        }
    }
}

impl Default for LockedTaskSet {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskSet for LockedTaskSet {
    fn insert(&self, task: Arc<Task>) -> bool {
        let mut tasks = self.tasks.lock();
        let old = tasks
            .iter()
            .find(|queued| queued.subject() == task.subject())
            .cloned();
        let superseded = match old {
            Some(old) => tasks.remove(&old),
            None => false,
        };
        tasks.insert(task);
        superseded
    }

    fn remove_by_subject(&self, subject: SubjectId) -> bool {
        let mut tasks = self.tasks.lock();
        let found = tasks
            .iter()
            .find(|queued| queued.subject() == subject)
            .cloned();
        match found {
            Some(task) => tasks.remove(&task),
            None => false,
        }
    }

    fn remove(&self, task: &Task) -> bool {
        self.tasks.lock().remove(task)
    }

    fn snapshot(&self) -> Vec<Arc<Task>> {
        self.tasks.lock().iter().cloned().collect()
    }

    fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }
}

/// Build the task set selected by `backend`.
///
/// The choice is a non-functional, environment-driven decision; both
/// backends satisfy the same contract.
pub fn build_task_set(backend: TaskSetBackend) -> Box<dyn TaskSet> {
    match backend {
        TaskSetBackend::Concurrent => {
            debug!("task set backed by a concurrent skip list");
            Box::new(ConcurrentTaskSet::new())
        }
        TaskSetBackend::Locked => {
            debug!("task set backed by a mutex-guarded ordered set");
            Box::new(LockedTaskSet::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::AppResult;
    use crate::core::subject::TimeoutTarget;
    use crate::core::task::TaskEffect;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Weak;
    use std::thread;
    use std::time::{Duration, SystemTime};

    struct Inert;

    impl TimeoutTarget for Inert {
        fn mark_timed_out(&self) -> AppResult<()> {
            Ok(())
        }
    }

    fn task_for(subject: &Arc<Inert>, at: SystemTime, seq: u64) -> Arc<Task> {
        let weak: Weak<dyn TimeoutTarget> = Arc::downgrade(subject);
        Arc::new(Task::new(
            at,
            seq,
            SubjectId::of(subject),
            TaskEffect::TransactionTimeout(weak),
        ))
    }

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn backends() -> Vec<Box<dyn TaskSet>> {
        vec![
            Box::new(ConcurrentTaskSet::new()),
            Box::new(LockedTaskSet::new()),
        ]
    }

    #[test]
    fn test_insert_supersedes_subject() {
        for set in backends() {
            let subject = Arc::new(Inert);

            assert!(!set.insert(task_for(&subject, at(100), 0)));
            assert!(set.insert(task_for(&subject, at(200), 1)));

            // Exactly one task remains, carrying the newer time.
            assert_eq!(set.len(), 1);
            let snapshot = set.snapshot();
            assert_eq!(snapshot[0].execution_time(), at(200));
        }
    }

    #[test]
    fn test_distinct_subjects_coexist() {
        for set in backends() {
            let a = Arc::new(Inert);
            let b = Arc::new(Inert);

            set.insert(task_for(&a, at(100), 0));
            set.insert(task_for(&b, at(100), 1));

            assert_eq!(set.len(), 2);
        }
    }

    #[test]
    fn test_snapshot_ordering() {
        for set in backends() {
            let a = Arc::new(Inert);
            let b = Arc::new(Inert);
            let c = Arc::new(Inert);

            set.insert(task_for(&a, at(300), 0));
            set.insert(task_for(&b, at(100), 1));
            set.insert(task_for(&c, at(300), 2));

            let times: Vec<_> = set
                .snapshot()
                .iter()
                .map(|task| task.execution_time())
                .collect();
            assert_eq!(times, vec![at(100), at(300), at(300)]);

            // Within the shared timestamp, insertion order decides.
            let snapshot = set.snapshot();
            assert_eq!(snapshot[1].subject(), SubjectId::of(&a));
            assert_eq!(snapshot[2].subject(), SubjectId::of(&c));
        }
    }

    #[test]
    fn test_remove_by_subject() {
        for set in backends() {
            let queued = Arc::new(Inert);
            let absent = Arc::new(Inert);

            set.insert(task_for(&queued, at(100), 0));

            assert!(!set.remove_by_subject(SubjectId::of(&absent)));
            assert!(set.remove_by_subject(SubjectId::of(&queued)));
            assert!(set.is_empty());
        }
    }

    #[test]
    fn test_remove_twice_noop() {
        for set in backends() {
            let subject = Arc::new(Inert);
            let task = task_for(&subject, at(100), 0);

            set.insert(Arc::clone(&task));
            assert!(set.remove(&task));
            assert!(!set.remove(&task));
            assert_eq!(set.len(), 0);
        }
    }

    #[test]
    fn test_racing_producers() {
        let sets: Vec<Arc<dyn TaskSet>> = vec![
            Arc::new(ConcurrentTaskSet::new()),
            Arc::new(LockedTaskSet::new()),
        ];
        for set in sets {
            let subject = Arc::new(Inert);
            let seq = Arc::new(AtomicU64::new(0));

            let mut handles = Vec::new();
            for _ in 0..8 {
                let set = Arc::clone(&set);
                let subject = Arc::clone(&subject);
                let seq = Arc::clone(&seq);
                handles.push(thread::spawn(move || {
                    for _ in 0..50 {
                        let n = seq.fetch_add(1, Ordering::Relaxed);
                        set.insert(task_for(&subject, at(1_000 + n), n));
                    }
                }));
            }
            for handle in handles {
                handle.join().unwrap();
            }

            assert_eq!(set.len(), 1);
        }
    }
}
