//! End-to-end: a single spawned thread computes a value, the caller joins
//! it and gets that exact value back.
//!
//! Each scenario in this suite lives in its own file/process: `SIGVTALRM`
//! and `ITIMER_VIRTUAL` are process-wide resources, and the scheduler binds
//! itself to whichever OS thread first calls `init`, so only one scenario
//! can safely be live per process.

use std::ffi::c_void;

use uthreads::ExitValue;

extern "C" fn worker(arg: *mut c_void) -> *mut c_void {
    let n = arg as usize;
    (n * 2) as *mut c_void
}

#[test]
fn join_returns_workers_value() {
    uthreads::init();
    let t = uthreads::create(worker, 21usize as *mut c_void);
    let result = uthreads::join(t).expect("join should succeed");
    match result {
        ExitValue::Returned(p) => assert_eq!(p as usize, 42),
        ExitValue::Cancelled => panic!("worker should not have been cancelled"),
    }
}
