//! Caller-facing error type.
//!
//! Anything that can be attributed to a single bad call (an unknown handle,
//! a join that would deadlock, a misused mutex) comes back as an `Error`
//! the caller can match on. Anything that reflects the scheduler's own
//! invariants being violated (an empty ready queue mid-dispatch, a failed
//! syscall the library cannot recover from) is logged and treated as fatal,
//! see [`crate::critical::fatal`].

use thiserror::Error;

use crate::thread::ThreadId;

/// Failure modes a caller of this library can observe and recover from.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The given [`ThreadId`] does not name a thread known to the scheduler.
    #[error("unknown thread id {0:?}")]
    InvalidThread(ThreadId),

    /// A thread tried to join itself, or joining would create a cycle
    /// (the target is itself blocked waiting to join the caller).
    #[error("joining {0:?} would deadlock")]
    MutualDeadlock(ThreadId),

    /// The mutex handle has not been initialized, or has already been
    /// destroyed.
    #[error("mutex is not initialized")]
    InvalidMutex,

    /// `unlock` was called by a thread that is not the current holder.
    #[error("calling thread does not hold this mutex")]
    NotHolder,
}

pub type Result<T> = std::result::Result<T, Error>;
