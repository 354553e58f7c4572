//! A quantum of zero disables the preemption timer entirely; threads still
//! make progress purely through explicit yields and joins.

use std::ffi::c_void;

use uthreads::{ExitValue, SchedulerConfig};

extern "C" fn cooperative_worker(_arg: *mut c_void) -> *mut c_void {
    for _ in 0..3 {
        uthreads::yield_now();
    }
    41usize as *mut c_void
}

#[test]
fn zero_quantum_disables_preemption_but_yields_still_work() {
    uthreads::init_with_config(SchedulerConfig::with_quantum_usec(0));
    let t = uthreads::create(cooperative_worker, std::ptr::null_mut());
    let result = uthreads::join(t).expect("join should succeed");
    match result {
        ExitValue::Returned(p) => assert_eq!(p as usize, 41),
        ExitValue::Cancelled => panic!("worker should not have been cancelled"),
    }
}
