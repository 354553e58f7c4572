//! The scheduler: thread table, run queue, dispatch, and the public
//! operations (`init`, `create`, `join`, `exit`, `yield_now`, `current`,
//! `equal`, `cancel`) built on top of it.
//!
//! All mutable scheduler state lives behind a single global cell, accessed
//! exclusively through [`with_scheduler_mut`], and every entry point masks
//! `SIGVTALRM` for its duration via [`crate::critical::CriticalSection`].
//! `SIGVTALRM`'s own handler runs with the signal already blocked by the
//! kernel for the duration of the handler, so [`on_tick`] needs no explicit
//! mask of its own.
//!
//! A context's captured signal mask travels with it: `getcontext` records
//! whatever mask is active at the time, and `swapcontext` restores it on
//! resume. So a thread that entered `dispatch` with the signal masked comes
//! back out of its own `swapcontext` call still masked, and the
//! `CriticalSection` guard that was live across the call unmasks it
//! correctly when it drops. No separate bookkeeping is needed to keep the
//! mask consistent across a switch.

use std::cell::UnsafeCell;
use std::collections::HashMap;

use crate::context::{self, Context, TrampolineFn};
use crate::critical::{fatal, CriticalSection};
use crate::error::{Error, Result};
use crate::queue::Fifo;
use crate::thread::{ExitValue, JoinState, ThreadId, ThreadRecord, ThreadSnapshot};
use crate::timer;

/// Tunable scheduler parameters. The only knob is the preemption quantum;
/// everything else about the scheduler is fixed by its design.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    quantum_usec: i64,
}

impl SchedulerConfig {
    /// Build a config with an explicit quantum, in microseconds. Zero
    /// disables preemption entirely: dispatch then only happens on an
    /// explicit yield, join-wait, or exit.
    pub const fn with_quantum_usec(quantum_usec: i64) -> Self {
        Self { quantum_usec }
    }

    pub const fn quantum_usec(&self) -> i64 {
        self.quantum_usec
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { quantum_usec: timer::DEFAULT_QUANTUM_USEC }
    }
}

/// A user thread's entry point, matching the POSIX `pthread` start routine
/// shape: one opaque argument in, one opaque return value out.
pub type StartRoutine = extern "C" fn(*mut core::ffi::c_void) -> *mut core::ffi::c_void;

struct ThreadEntry {
    routine: StartRoutine,
    arg: *mut core::ffi::c_void,
}

pub struct Scheduler {
    threads: HashMap<ThreadId, ThreadRecord>,
    run_queue: Fifo<ThreadId>,
    dead_queue: Fifo<ThreadId>,
    join_queue: Fifo<ThreadId>,
    next_id: u64,
}

struct SchedulerCell(UnsafeCell<Option<Scheduler>>);

// Safety: every access goes through `with_scheduler_mut`, which is only
// ever called with `SIGVTALRM` masked, and this library runs on a single
// OS thread, so there is never real concurrent access to the cell.
unsafe impl Sync for SchedulerCell {}

static SCHEDULER: SchedulerCell = SchedulerCell(UnsafeCell::new(None));

fn with_scheduler_mut<R>(f: impl FnOnce(&mut Scheduler) -> R) -> R {
    let slot = unsafe { &mut *SCHEDULER.0.get() };
    match slot {
        Some(sched) => f(sched),
        None => fatal("scheduler used before init"),
    }
}

/// Initialize the scheduler on the calling OS thread, wrapping its current
/// execution as thread id 0 and arming the preemption timer per `config`.
/// Calling this more than once is a no-op.
pub fn init(config: SchedulerConfig) {
    let _cs = CriticalSection::enter();
    let already_initialized = unsafe { (*SCHEDULER.0.get()).is_some() };
    if already_initialized {
        log::debug!("scheduler already initialized");
        return;
    }
    let boot_ctx = match Context::capture_current() {
        Ok(ctx) => ctx,
        Err(e) => fatal(&format!("getcontext for bootstrap thread failed: {e}")),
    };
    let mut sched = Scheduler {
        threads: HashMap::new(),
        run_queue: Fifo::new(),
        dead_queue: Fifo::new(),
        join_queue: Fifo::new(),
        next_id: 1,
    };
    let id = ThreadId(0);
    sched.threads.insert(id, ThreadRecord::new(id, boot_ctx));
    sched.run_queue.enqueue(id);
    unsafe {
        *SCHEDULER.0.get() = Some(sched);
    }
    timer::install(config.quantum_usec());
    log::info!("scheduler initialized, bootstrap thread is {id:?}, quantum {}us", config.quantum_usec());
}

/// A diagnostic snapshot of every thread the scheduler currently knows
/// about, live or dead. For observability and tests only; each entry is a
/// copy and confers no ownership over the underlying record.
pub fn snapshot_all() -> Vec<ThreadSnapshot> {
    let _cs = CriticalSection::enter();
    with_scheduler_mut(|sched| {
        sched
            .threads
            .values()
            .map(|r| ThreadSnapshot { id: r.id, finished: r.finished, join_state: r.join_state })
            .collect()
    })
}

/// Spawn a new thread running `routine(arg)`. The thread is appended to the
/// run queue and will get its first quantum in normal round-robin order.
pub fn spawn(routine: StartRoutine, arg: *mut core::ffi::c_void) -> ThreadId {
    let _cs = CriticalSection::enter();
    with_scheduler_mut(|sched| {
        let id = ThreadId(sched.next_id);
        sched.next_id += 1;

        let payload = Box::new(ThreadEntry { routine, arg });
        let raw = Box::into_raw(payload) as *mut core::ffi::c_void;

        let entry: TrampolineFn = trampoline_entry;
        let ctx = match Context::new_thread(context::DEFAULT_STACK_SIZE, entry, raw, std::ptr::null_mut()) {
            Ok(ctx) => ctx,
            Err(e) => fatal(&format!("getcontext for new thread failed: {e}")),
        };

        sched.threads.insert(id, ThreadRecord::new(id, ctx));
        sched.run_queue.enqueue(id);
        log::debug!("created thread {id:?}");
        id
    })
}

extern "C" fn trampoline_entry(arg_hi: u32, arg_lo: u32) {
    let raw = context::reassemble_arg(arg_hi, arg_lo) as *mut ThreadEntry;
    let entry = unsafe { Box::from_raw(raw) };
    let retval = (entry.routine)(entry.arg);
    exit(retval);
}

/// The currently running thread.
pub fn current_id() -> ThreadId {
    let _cs = CriticalSection::enter();
    with_scheduler_mut(|sched| *sched.run_queue.front().unwrap_or_else(|| fatal("no current thread")))
}

pub fn equal(a: ThreadId, b: ThreadId) -> bool {
    a == b
}

/// Voluntarily give up the remainder of the current quantum.
pub fn yield_now() {
    let _cs = CriticalSection::enter();
    with_scheduler_mut(|sched| {
        let cur = *sched.run_queue.front().unwrap_or_else(|| fatal("no current thread"));
        dispatch(sched, cur);
    });
}

/// Preemption timer fired. Re-enter the dispatcher exactly as a voluntary
/// yield would.
pub fn on_tick() {
    with_scheduler_mut(|sched| {
        let cur = *sched.run_queue.front().unwrap_or_else(|| fatal("no current thread"));
        dispatch(sched, cur);
    });
}

/// Request that `target` be cancelled. The cancellation is applied the next
/// time the scheduler dispatches `target` rather than immediately, except
/// that a thread cancelling itself yields right away so the request takes
/// effect without waiting for the timer.
pub fn cancel(target: ThreadId) -> Result<()> {
    let _cs = CriticalSection::enter();
    let is_self = with_scheduler_mut(|sched| -> Result<bool> {
        let cur = *sched.run_queue.front().unwrap_or_else(|| fatal("no current thread"));
        let rec = sched.threads.get_mut(&target).ok_or(Error::InvalidThread(target))?;
        rec.cancel_requested = true;
        Ok(cur == target)
    })?;
    if is_self {
        with_scheduler_mut(|sched| dispatch(sched, target));
    }
    Ok(())
}

/// Terminate the calling thread with `retval`, waking anyone joined on it
/// and handing control to the next runnable thread. Never returns.
pub fn exit(retval: *mut core::ffi::c_void) -> ! {
    {
        let _cs = CriticalSection::enter();
        with_scheduler_mut(|sched| {
            let id = *sched.run_queue.front().unwrap_or_else(|| fatal("no current thread"));
            let rec = sched.threads.get_mut(&id).unwrap_or_else(|| fatal("current thread vanished"));
            rec.finished = true;
            rec.retval = Some(ExitValue::Returned(retval));
            dispatch(sched, id);
        });
    }
    fatal("exited thread resumed after dispatch");
}

/// Block the calling thread until `target` finishes, then return its exit
/// value. Rejects self-joins and joins that would deadlock (the target is
/// itself already blocked waiting on the caller).
pub fn join(target: ThreadId) -> Result<ExitValue> {
    let _cs = CriticalSection::enter();

    let outcome = with_scheduler_mut(|sched| -> Result<JoinOutcome> {
        let caller = *sched.run_queue.front().unwrap_or_else(|| fatal("no current thread"));
        if caller == target {
            return Err(Error::MutualDeadlock(target));
        }
        if !sched.threads.contains_key(&target) {
            return Err(Error::InvalidThread(target));
        }

        if sched.threads.get(&target).map(|r| r.finished).unwrap_or(false) {
            return Ok(JoinOutcome::Immediate(reap(sched, target)));
        }

        let would_deadlock = sched.join_queue.iter().any(|&waiter| {
            waiter == target && sched.threads.get(&waiter).and_then(|r| r.wait_target) == Some(caller)
        });
        if would_deadlock {
            return Err(Error::MutualDeadlock(target));
        }

        sched.run_queue.remove_first(|id| *id == caller);
        {
            let rec = sched.threads.get_mut(&caller).unwrap_or_else(|| fatal("caller vanished"));
            rec.join_state = JoinState::Waiting;
            rec.wait_target = Some(target);
        }
        sched.join_queue.enqueue(caller);
        dispatch(sched, caller);
        Ok(JoinOutcome::Parked(caller))
    })?;

    let caller = match outcome {
        JoinOutcome::Immediate(v) => return Ok(v),
        JoinOutcome::Parked(caller) => caller,
    };

    // Execution only resumes here once something has put `caller` back on
    // the run queue and chosen it to run, which only happens in
    // `wake_joiners` once `target` has finished. So `join_state` is
    // guaranteed `Completed` and `joinee` guaranteed set by now; there is
    // nothing left to wait for.
    Ok(with_scheduler_mut(|sched| {
        let rec = sched.threads.get_mut(&caller).unwrap_or_else(|| fatal("caller vanished"));
        debug_assert!(matches!(rec.join_state, JoinState::Completed));
        let resolved = rec.joinee.take().unwrap_or(target);
        debug_assert_eq!(resolved, target);
        rec.join_state = JoinState::Idle;
        rec.wait_target = None;
        reap(sched, resolved)
    }))
}

enum JoinOutcome {
    Immediate(ExitValue),
    Parked(ThreadId),
}

/// Move a thread that has just stopped running (already popped off the run
/// queue, by the caller) into the dead queue and wake anyone waiting to
/// join it. `fallback` supplies the exit value for a thread that had not
/// already recorded one (the cancellation path); a thread that called
/// `exit` itself already has `retval` set and `fallback` is unused.
fn finalize(sched: &mut Scheduler, id: ThreadId, fallback: ExitValue) {
    let rec = sched.threads.get_mut(&id).unwrap_or_else(|| fatal("finalized a thread with no record"));
    rec.finished = true;
    if rec.retval.is_none() {
        rec.retval = Some(fallback);
    }
    sched.dead_queue.enqueue(id);
    wake_joiners(sched, id);
}

/// Cycle through the join queue once per entry, moving anyone waiting on
/// `finished_id` back onto the run queue.
fn wake_joiners(sched: &mut Scheduler, finished_id: ThreadId) {
    let n = sched.join_queue.len();
    for _ in 0..n {
        let waiter = *sched.join_queue.front().unwrap_or_else(|| fatal("empty join queue mid-cycle"));
        if sched.threads.get(&waiter).and_then(|r| r.wait_target) == Some(finished_id) {
            sched.join_queue.pop();
            if let Some(rec) = sched.threads.get_mut(&waiter) {
                rec.join_state = JoinState::Completed;
                rec.joinee = Some(finished_id);
            }
            sched.run_queue.enqueue(waiter);
        } else {
            sched.join_queue.cycle();
        }
    }
}

/// Pull a finished thread's exit value out and drop its record, reaping it
/// from the dead queue. Self-contained so both the immediate-join and
/// parked-join paths share it.
fn reap(sched: &mut Scheduler, id: ThreadId) -> ExitValue {
    sched.dead_queue.remove_first(|dq_id| *dq_id == id);
    match sched.threads.remove(&id) {
        Some(rec) => rec.retval.unwrap_or(ExitValue::Cancelled),
        None => fatal("reaped a thread with no record"),
    }
}

/// The single transition point between threads: retire `from_id` (the
/// thread asking to be switched away from), sweep away any newly-cancelled
/// thread at the front of the run queue, and switch execution to whoever is
/// left. Must be called with `SIGVTALRM` masked.
///
/// `from_id` is normally still at the front of the run queue (a voluntary
/// yield, a tick, a self-cancel, or `exit`). The one exception is a thread
/// parking itself to wait on a join: it has already been moved to the join
/// queue before calling here, so there is nothing of its own left to retire
/// or requeue, only a context to switch away from.
fn dispatch(sched: &mut Scheduler, from_id: ThreadId) {
    if sched.run_queue.front() == Some(&from_id) {
        sched.run_queue.pop();
        let finished = sched.threads.get(&from_id).map(|r| r.finished).unwrap_or(true);
        let cancelled = sched.threads.get(&from_id).map(|r| r.cancel_requested && !r.finished).unwrap_or(false);
        if finished || cancelled {
            finalize(sched, from_id, ExitValue::Cancelled);
        } else {
            sched.run_queue.enqueue(from_id);
        }
    }

    loop {
        let front = match sched.run_queue.front() {
            Some(id) => *id,
            None => break,
        };
        let should_cancel = sched
            .threads
            .get(&front)
            .map(|r| r.cancel_requested && !r.finished)
            .unwrap_or(false);
        if should_cancel {
            sched.run_queue.pop();
            finalize(sched, front, ExitValue::Cancelled);
            continue;
        }
        break;
    }

    let next_id = match sched.run_queue.front() {
        Some(id) => *id,
        None => {
            log::info!("last thread exited, shutting down");
            timer::disarm();
            std::process::exit(0);
        }
    };

    if next_id == from_id {
        timer::rearm();
        return;
    }

    timer::rearm();
    let from_ptr: *mut libc::ucontext_t = {
        let rec = sched.threads.get_mut(&from_id).unwrap_or_else(|| fatal("outgoing thread vanished"));
        &mut rec.context.uctx
    };
    let to_ptr: *mut libc::ucontext_t = {
        let rec = sched.threads.get_mut(&next_id).unwrap_or_else(|| fatal("next thread vanished"));
        &mut rec.context.uctx
    };
    log::trace!("switching {from_id:?} -> {next_id:?}");
    unsafe {
        context::swap(from_ptr, to_ptr);
    }
}
