//! Subject identity and the callback contracts obligations are bound to.
//!
//! The scheduler never owns its collaborators. A transaction, a recoverer, or
//! a connection pool is referenced through a weak handle plus a [`SubjectId`]
//! identity token, so the scheduler can neither extend a subject's lifetime
//! nor create retention cycles back into the transaction manager.

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use super::error::AppResult;

/// Identity token for the logical owner of a scheduled obligation.
///
/// Two tokens compare equal exactly when they were taken from the same live
/// allocation (reference identity, never value equality). A queued task holds
/// a weak handle to its subject, which keeps the allocation slot alive, so
/// the address cannot be recycled into a different subject while the task is
/// queued.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubjectId(usize);

impl SubjectId {
    /// Identity of the subject behind `subject`.
    pub fn of<T: ?Sized>(subject: &Arc<T>) -> Self {
        Self(Arc::as_ptr(subject).cast::<()>() as usize)
    }
}

impl fmt::Debug for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubjectId({:#x})", self.0)
    }
}

/// A transaction whose timeout obligation the scheduler tracks.
pub trait TimeoutTarget: Send + Sync + 'static {
    /// Mark the transaction as timed out. Called from the scheduler's worker
    /// thread, at most once per queued obligation. Whatever rollback
    /// machinery the mark triggers is the transaction's own concern.
    fn mark_timed_out(&self) -> AppResult<()>;
}

/// The recovery subsystem's entry point for one background recovery pass.
pub trait Recoverer: Send + Sync + 'static {
    /// Run one recovery pass. The scheduler provides single-shot timers
    /// only: an implementation that needs periodic re-runs re-schedules a
    /// fresh obligation from inside this call.
    fn recover(&self) -> AppResult<()>;
}

/// A connection pool that sheds idle connections on a schedule it chooses.
pub trait ShrinkablePool: Send + Sync + 'static {
    /// When the pool next wants to shrink, or `None` when the pool has no
    /// shrink schedule configured.
    fn next_shrink_at(&self) -> Option<SystemTime>;

    /// Close connections that have sat idle past the pool's threshold.
    fn shrink(&self) -> AppResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_per_allocation() {
        let a = Arc::new(17_u32);
        let b = Arc::new(17_u32);

        assert_eq!(SubjectId::of(&a), SubjectId::of(&a));
        assert_eq!(SubjectId::of(&a), SubjectId::of(&Arc::clone(&a)));
        assert_ne!(SubjectId::of(&a), SubjectId::of(&b));
    }

    #[test]
    fn test_identity_ignores_value() {
        let a = Arc::new(String::from("tx-1"));
        let b = Arc::new(String::from("tx-1"));
        assert_ne!(SubjectId::of(&a), SubjectId::of(&b));
    }

    #[test]
    fn test_debug_format() {
        let a = Arc::new(0_u8);
        let rendered = format!("{:?}", SubjectId::of(&a));
        assert!(rendered.starts_with("SubjectId(0x"));
    }
}
