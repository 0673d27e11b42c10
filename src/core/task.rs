//! The scheduled obligation value and its effect.

use std::cmp::Ordering;
use std::sync::Weak;
use std::time::SystemTime;

use tracing::debug;

use super::error::AppResult;
use super::subject::{Recoverer, ShrinkablePool, SubjectId, TimeoutTarget};

/// The work a task performs when it comes due.
///
/// One tagged union covers the three obligation kinds the transaction
/// manager schedules, so the scheduler stays variant-agnostic and only ever
/// calls [`TaskEffect::run`]. Each variant holds a weak handle: the subject
/// may be dropped by its owner at any moment, and a dead handle turns the
/// effect into a no-op instead of keeping the subject alive.
#[derive(Debug)]
pub enum TaskEffect {
    /// Mark a transaction as timed out.
    TransactionTimeout(Weak<dyn TimeoutTarget>),
    /// Trigger one background recovery pass.
    Recovery(Weak<dyn Recoverer>),
    /// Ask a connection pool to close idle connections.
    PoolShrink(Weak<dyn ShrinkablePool>),
}

impl TaskEffect {
    /// Short label for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TransactionTimeout(_) => "transaction timeout",
            Self::Recovery(_) => "recovery",
            Self::PoolShrink(_) => "pool shrink",
        }
    }

    /// Invoke the effect once.
    ///
    /// A dead subject handle means the owner was dropped before the
    /// obligation fired; the effect degrades to a successful no-op so the
    /// task is retired like any other.
    ///
    /// # Errors
    ///
    /// Propagates the subject callback's failure.
    pub fn run(&self) -> AppResult<()> {
        match self {
            Self::TransactionTimeout(transaction) => match transaction.upgrade() {
                Some(transaction) => transaction.mark_timed_out(),
                None => {
                    debug!("transaction dropped before its timeout fired");
                    Ok(())
                }
            },
            Self::Recovery(recoverer) => match recoverer.upgrade() {
                Some(recoverer) => recoverer.recover(),
                None => {
                    debug!("recoverer dropped before its recovery pass fired");
                    Ok(())
                }
            },
            Self::PoolShrink(pool) => match pool.upgrade() {
                Some(pool) => pool.shrink(),
                None => {
                    debug!("pool dropped before its shrink fired");
                    Ok(())
                }
            },
        }
    }
}

/// A single scheduled, cancellable, single-shot timed obligation.
///
/// Immutable once constructed: re-scheduling a subject is modeled as
/// supersede-and-insert, never as in-place mutation. Tasks order by
/// `(execution_time, seq)`, where `seq` is the scheduler's insertion
/// sequence, so a sorted container stays total even when two tasks share a
/// timestamp. The effect never participates in comparison.
#[derive(Debug)]
pub struct Task {
    execution_time: SystemTime,
    seq: u64,
    subject: SubjectId,
    effect: TaskEffect,
}

impl Task {
    /// Bind an effect to a subject and an execution time. `seq` must be
    /// unique per task; the scheduler draws it from an atomic counter.
    pub(crate) fn new(
        execution_time: SystemTime,
        seq: u64,
        subject: SubjectId,
        effect: TaskEffect,
    ) -> Self {
        Self {
            execution_time,
            seq,
            subject,
            effect,
        }
    }

    /// When the effect becomes eligible to run.
    pub fn execution_time(&self) -> SystemTime {
        self.execution_time
    }

    /// Identity of the obligation's owner.
    pub fn subject(&self) -> SubjectId {
        self.subject
    }

    /// Short label of the obligation kind, for log lines.
    pub fn kind(&self) -> &'static str {
        self.effect.kind()
    }

    /// The effect this task will perform.
    pub(crate) fn effect(&self) -> &TaskEffect {
        &self.effect
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.execution_time == other.execution_time && self.seq == other.seq
    }
}

impl Eq for Task {}

impl PartialOrd for Task {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Task {
    fn cmp(&self, other: &Self) -> Ordering {
        // Earliest execution time first; insertion order within a timestamp.
        match self.execution_time.cmp(&other.execution_time) {
            Ordering::Equal => self.seq.cmp(&other.seq),
            other => other,
        }
    }
}
