//! Two threads that try to join each other are refused rather than left to
//! deadlock: the second join request to form the cycle is the one that
//! fails, while the first completes normally once its target exits.

use std::ffi::c_void;

use uthreads::{Error, ThreadId};

// Packs the bootstrap thread's id in, and a result code out:
// 0 = not yet run, 1 = saw the expected MutualDeadlock, 2 = anything else.
struct Exchange {
    main_id: ThreadId,
    outcome: i32,
}

extern "C" fn tries_to_join_main(arg: *mut c_void) -> *mut c_void {
    let exchange = unsafe { &mut *(arg as *mut Exchange) };
    exchange.outcome = match uthreads::join(exchange.main_id) {
        Err(Error::MutualDeadlock(_)) => 1,
        _ => 2,
    };
    std::ptr::null_mut()
}

#[test]
fn mutual_join_is_rejected() {
    uthreads::init();
    let main_id = uthreads::current();

    let mut exchange = Exchange { main_id, outcome: 0 };
    let worker = uthreads::create(tries_to_join_main, &mut exchange as *mut Exchange as *mut c_void);

    // By the time this returns, `worker` has already run (it had to, to
    // wake us), attempted its own join on us, and recorded the outcome.
    uthreads::join(worker).expect("worker should finish normally");

    assert_eq!(exchange.outcome, 1, "worker's join on main should have failed as a mutual deadlock");
}
