//! A user-space threading library with a POSIX-threads-shaped API: a
//! single-OS-thread scheduler that runs many lightweight "green" threads
//! round-robin, preempting each at a fixed quantum via a virtual-time
//! signal, with explicit context switching, thread join/cancellation, and
//! a FIFO mutex.
//!
//! Everything runs on the OS thread that calls [`init`]. There is no
//! multicore support and no work-stealing: this is a teaching-scheduler
//! shaped library, not a production async runtime.
//!
//! ```no_run
//! use std::ffi::c_void;
//!
//! extern "C" fn worker(_arg: *mut c_void) -> *mut c_void {
//!     println!("hello from a green thread");
//!     std::ptr::null_mut()
//! }
//!
//! fn main() {
//!     uthreads::init();
//!     let t = uthreads::create(worker, std::ptr::null_mut());
//!     let _exit_value = uthreads::join(t).unwrap();
//! }
//! ```

#![cfg(unix)]

mod context;
mod critical;
mod error;
mod mutex;
mod queue;
mod scheduler;
mod thread;

pub use error::Error;
pub use mutex::Mutex;
pub use scheduler::{SchedulerConfig, StartRoutine};
pub use thread::{ExitValue, ThreadId, ThreadSnapshot};

/// Initialize the library on the calling thread with the default
/// preemption quantum. Must be called before any other function. Calling
/// it again is harmless and a no-op.
pub fn init() {
    scheduler::init(SchedulerConfig::default());
}

/// Initialize the library on the calling thread with an explicit
/// [`SchedulerConfig`], e.g. to change the preemption quantum or disable
/// preemption entirely (quantum zero).
pub fn init_with_config(config: SchedulerConfig) {
    scheduler::init(config);
}

/// Spawn a new thread running `routine(arg)`, scheduled round-robin
/// alongside every other thread created this way.
pub fn create(routine: StartRoutine, arg: *mut core::ffi::c_void) -> ThreadId {
    scheduler::spawn(routine, arg)
}

/// The identity of the calling thread.
pub fn current() -> ThreadId {
    scheduler::current_id()
}

/// Whether two handles name the same thread.
pub fn equal(a: ThreadId, b: ThreadId) -> bool {
    scheduler::equal(a, b)
}

/// Give up the rest of the current quantum, letting the next thread run.
pub fn yield_now() {
    scheduler::yield_now();
}

/// Block until `target` has finished, then return the value it exited
/// with. A thread may be joined by at most one other thread at a time; a
/// second concurrent join on the same target is a programming error the
/// scheduler does not attempt to reconcile.
///
/// The returned [`ExitValue`] distinguishes a thread that called [`exit`]
/// from one that was cancelled, even if the thread function's own return
/// value happened to be a null pointer.
///
/// # Errors
/// - [`Error::InvalidThread`] if `target` names no thread this library
///   knows about (including one already reaped by an earlier join).
/// - [`Error::MutualDeadlock`] if `target` is the caller itself, or if
///   `target` is already blocked waiting to join the caller.
pub fn join(target: ThreadId) -> Result<ExitValue, Error> {
    scheduler::join(target)
}

/// Terminate the calling thread, handing `retval` to whoever joins it.
/// Never returns.
pub fn exit(retval: *mut core::ffi::c_void) -> ! {
    scheduler::exit(retval)
}

/// Request that `target` be cancelled. Cancellation is asynchronous and
/// applied the next time the scheduler would otherwise run `target`,
/// except a thread cancelling itself yields immediately so the request is
/// visible without waiting for the next quantum. A cancelled thread's
/// join value is a dedicated sentinel distinguishable from any value a
/// thread function could legitimately return.
pub fn cancel(target: ThreadId) -> Result<(), Error> {
    scheduler::cancel(target)
}

/// A diagnostic snapshot of every thread currently known to the scheduler,
/// live or dead, for observability and tests. Each entry is a copy and
/// confers no ownership.
pub fn snapshot_all() -> Vec<ThreadSnapshot> {
    scheduler::snapshot_all()
}
