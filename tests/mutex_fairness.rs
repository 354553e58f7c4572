//! The mutex grants access in strict arrival order: whoever enqueued first
//! acquires next, even when later arrivals get more chances to notice the
//! lock is free in between.

use std::ffi::c_void;

use uthreads::Mutex;

struct Shared {
    mutex: Mutex,
    order: Vec<u32>,
}

struct WorkerArgs {
    shared: *mut Shared,
    id: u32,
}

extern "C" fn contend(arg: *mut c_void) -> *mut c_void {
    let args = unsafe { &*(arg as *const WorkerArgs) };
    let shared = unsafe { &mut *args.shared };

    shared.mutex.lock().expect("lock should succeed");
    shared.order.push(args.id);
    // Hold the lock across a couple of quanta so the other contenders get
    // a chance to enqueue (and repeatedly notice the lock is still held)
    // before this one releases it.
    uthreads::yield_now();
    uthreads::yield_now();
    shared.mutex.unlock().expect("unlock should succeed");
    std::ptr::null_mut()
}

#[test]
fn mutex_is_fifo_under_contention() {
    uthreads::init();

    let mut shared = Shared { mutex: Mutex::new(), order: Vec::new() };
    let shared_ptr = &mut shared as *mut Shared;

    let mut args = [
        WorkerArgs { shared: shared_ptr, id: 1 },
        WorkerArgs { shared: shared_ptr, id: 2 },
        WorkerArgs { shared: shared_ptr, id: 3 },
    ];

    let ids: Vec<_> = args.iter_mut().map(|a| uthreads::create(contend, a as *mut WorkerArgs as *mut c_void)).collect();

    for id in ids {
        uthreads::join(id).expect("worker should finish normally");
    }

    assert_eq!(shared.order, vec![1, 2, 3]);
}
