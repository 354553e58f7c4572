//! Thread records and the small pieces of state attached to them: identity,
//! exit value, and join bookkeeping.

use crate::context::Context;

/// Opaque handle identifying a thread, stable for the thread's entire
/// lifetime including after it has finished and is only waiting to be
/// reaped by a join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadId(pub u64);

/// The value a finished thread leaves behind for whoever joins it.
///
/// `Cancelled` is a sentinel distinct from any value a thread could legally
/// return on its own, so a joiner can always tell the two apart even if the
/// user's thread function happens to return a null pointer itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitValue {
    Returned(*mut core::ffi::c_void),
    Cancelled,
}

unsafe impl Send for ExitValue {}

impl ExitValue {
    pub fn into_raw(self) -> *mut core::ffi::c_void {
        match self {
            ExitValue::Returned(p) => p,
            ExitValue::Cancelled => std::ptr::null_mut(),
        }
    }
}

/// Where a thread stands with respect to being joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinState {
    /// Not currently waiting on anyone.
    Idle,
    /// Blocked in `join`, waiting on `wait_target`.
    Waiting,
    /// The join this thread was waiting on has been satisfied; it is ready
    /// to be moved back onto the run queue.
    Completed,
}

/// Everything the scheduler tracks about one user thread.
pub struct ThreadRecord {
    pub id: ThreadId,
    pub context: Context,
    pub finished: bool,
    pub retval: Option<ExitValue>,
    pub join_state: JoinState,
    /// The thread this one is waiting to join, if `join_state == Waiting`.
    pub wait_target: Option<ThreadId>,
    /// Once `join_state == Completed`, the id of the thread whose finish
    /// woke this one up. Set by `wake_joiners` on the waiter's own record;
    /// cleared once the join call reaps it.
    pub joinee: Option<ThreadId>,
    pub cancel_requested: bool,
}

/// A point-in-time copy of a thread record's externally observable state.
/// For diagnostics and tests; confers no ownership, matching the rule that
/// application-visible handles are values rather than owning references.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadSnapshot {
    pub id: ThreadId,
    pub finished: bool,
    pub join_state: JoinState,
}

impl ThreadRecord {
    pub fn new(id: ThreadId, context: Context) -> Self {
        Self {
            id,
            context,
            finished: false,
            retval: None,
            join_state: JoinState::Idle,
            wait_target: None,
            joinee: None,
            cancel_requested: false,
        }
    }
}
