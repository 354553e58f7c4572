//! Critical-section discipline.
//!
//! Every piece of code that touches scheduler queues must run with
//! `SIGVTALRM` masked, or the preemption signal could fire mid-mutation and
//! hand a torn data structure to the signal handler. `CriticalSection` masks
//! on construction and unmasks on drop so this is enforced by scope rather
//! than by discipline at each call site: a single guard covers every path
//! into the scheduler instead of requiring each one to remember to mask.

use std::mem::MaybeUninit;

/// RAII guard: blocks `SIGVTALRM` for the OS thread while alive, restores
/// the previous mask on drop.
pub struct CriticalSection {
    saved: libc::sigset_t,
}

impl CriticalSection {
    pub fn enter() -> Self {
        let mut block = empty_sigset();
        unsafe {
            libc::sigaddset(&mut block, libc::SIGVTALRM);
        }
        let mut saved = empty_sigset();
        let rc = unsafe { libc::sigprocmask(libc::SIG_BLOCK, &block, &mut saved) };
        if rc != 0 {
            fatal("sigprocmask(SIG_BLOCK) failed");
        }
        Self { saved }
    }
}

impl Drop for CriticalSection {
    fn drop(&mut self) {
        let rc = unsafe { libc::sigprocmask(libc::SIG_SETMASK, &self.saved, std::ptr::null_mut()) };
        if rc != 0 {
            fatal("sigprocmask(SIG_SETMASK) failed");
        }
    }
}

fn empty_sigset() -> libc::sigset_t {
    let mut set = unsafe { MaybeUninit::<libc::sigset_t>::zeroed().assume_init() };
    unsafe {
        libc::sigemptyset(&mut set);
    }
    set
}

/// An internal invariant has been violated in a way no caller can recover
/// from (a corrupt queue, a failed syscall the library has no fallback
/// for). Log it and abort the process rather than continue with undefined
/// scheduler state.
pub fn fatal(msg: &str) -> ! {
    log::error!("fatal scheduler error: {msg}");
    std::process::abort();
}
