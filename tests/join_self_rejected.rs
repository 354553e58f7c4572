//! A thread joining itself is always rejected, even with nothing else
//! scheduled.

use uthreads::Error;

#[test]
fn join_self_is_mutual_deadlock() {
    uthreads::init();
    let me = uthreads::current();
    let err = uthreads::join(me).expect_err("self-join must fail");
    assert!(matches!(err, Error::MutualDeadlock(id) if uthreads::equal(id, me)));
}
