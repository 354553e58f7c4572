//! Preemption clock: a virtual-time interval timer delivering `SIGVTALRM`
//! at a configurable quantum, handled by re-entering the dispatcher.

use std::mem::MaybeUninit;
use std::os::raw::c_int;
use std::sync::atomic::{AtomicI64, Ordering};

/// Default scheduling quantum: a 50ms virtual-time tick.
pub const DEFAULT_QUANTUM_USEC: i64 = 50_000;

/// The quantum `install` was last called with. Zero means preemption is
/// disabled. Read by `rearm` on every dispatch, so it lives in a static
/// rather than being threaded through every call site.
static QUANTUM_USEC: AtomicI64 = AtomicI64::new(DEFAULT_QUANTUM_USEC);

extern "C" fn on_alarm(_sig: c_int) {
    crate::scheduler::on_tick();
}

/// Install the `SIGVTALRM` handler and arm `ITIMER_VIRTUAL` to fire every
/// `quantum_usec`. A quantum of zero disables preemption: neither the
/// handler nor the timer are installed, and dispatch only ever runs from
/// an explicit yield, join-wait, or exit. Called once from `init`.
pub fn install(quantum_usec: i64) {
    QUANTUM_USEC.store(quantum_usec, Ordering::SeqCst);
    if quantum_usec <= 0 {
        log::debug!("preemption disabled (quantum 0)");
        return;
    }
    unsafe {
        let mut action: libc::sigaction = MaybeUninit::zeroed().assume_init();
        action.sa_sigaction = on_alarm as usize;
        libc::sigemptyset(&mut action.sa_mask);
        action.sa_flags = 0;
        if libc::sigaction(libc::SIGVTALRM, &action, std::ptr::null_mut()) != 0 {
            crate::critical::fatal("sigaction(SIGVTALRM) failed");
        }
    }
    rearm();
}

/// Reset the interval timer to fire one quantum from now. Called after
/// every dispatch so a thread that just started running gets a full
/// quantum rather than whatever was left over from its predecessor. A
/// no-op when preemption is disabled.
pub fn rearm() {
    let quantum = QUANTUM_USEC.load(Ordering::SeqCst);
    if quantum <= 0 {
        return;
    }
    let interval = libc::timeval { tv_sec: 0, tv_usec: quantum };
    let it = libc::itimerval { it_interval: libc::timeval { tv_sec: 0, tv_usec: 0 }, it_value: interval };
    let rc = unsafe { libc::setitimer(libc::ITIMER_VIRTUAL, &it, std::ptr::null_mut()) };
    if rc != 0 {
        crate::critical::fatal("setitimer failed");
    }
}

/// Disarm the timer entirely. Called when the last thread exits.
pub fn disarm() {
    if QUANTUM_USEC.load(Ordering::SeqCst) <= 0 {
        return;
    }
    let zero = libc::itimerval {
        it_interval: libc::timeval { tv_sec: 0, tv_usec: 0 },
        it_value: libc::timeval { tv_sec: 0, tv_usec: 0 },
    };
    unsafe {
        libc::setitimer(libc::ITIMER_VIRTUAL, &zero, std::ptr::null_mut());
    }
}
