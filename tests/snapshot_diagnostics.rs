//! Diagnostic snapshots reflect thread state without granting ownership,
//! and a thread drops out of them once a join has reaped it.

use std::ffi::c_void;

extern "C" fn returns_immediately(_arg: *mut c_void) -> *mut c_void {
    std::ptr::null_mut()
}

#[test]
fn snapshot_reflects_lifecycle() {
    uthreads::init();
    let main_id = uthreads::current();
    let t = uthreads::create(returns_immediately, std::ptr::null_mut());

    let before = uthreads::snapshot_all();
    assert!(before.iter().any(|s| s.id == main_id));
    let worker_before = before.iter().find(|s| s.id == t).expect("worker should be tracked before it ever ran");
    assert!(!worker_before.finished, "worker has not been dispatched yet");

    uthreads::join(t).expect("join should succeed");

    let after = uthreads::snapshot_all();
    assert!(after.iter().all(|s| s.id != t), "a reaped thread should no longer be tracked");
}
