//! A thread that cancels itself is torn down immediately rather than
//! finishing the rest of its body, without waiting for the next tick.

use std::ffi::c_void;
use std::sync::atomic::{AtomicBool, Ordering};

use uthreads::ExitValue;

static REACHED_AFTER_CANCEL: AtomicBool = AtomicBool::new(false);

extern "C" fn cancels_itself(_arg: *mut c_void) -> *mut c_void {
    let me = uthreads::current();
    uthreads::cancel(me).expect("self-cancel should be accepted");
    // Unreachable: the cancellation takes effect inside `cancel` itself.
    REACHED_AFTER_CANCEL.store(true, Ordering::SeqCst);
    std::ptr::null_mut()
}

#[test]
fn self_cancel_terminates_immediately() {
    uthreads::init();
    let t = uthreads::create(cancels_itself, std::ptr::null_mut());
    let result = uthreads::join(t).expect("join should succeed");
    assert_eq!(result, ExitValue::Cancelled);
    assert!(!REACHED_AFTER_CANCEL.load(Ordering::SeqCst), "code after self-cancel must never run");
}
