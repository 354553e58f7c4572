//! A strictly FIFO mutex: whoever has waited longest acquires next.
//!
//! There is no reentrancy support and no deadlock detection beyond what
//! [`crate::scheduler::join`] already does for joins; a thread that locks a
//! mutex it already holds spins against itself forever.

use std::cell::RefCell;

use crate::error::{Error, Result};
use crate::queue::Fifo;
use crate::scheduler;
use crate::thread::ThreadId;

struct Inner {
    waiters: Fifo<ThreadId>,
    holder: Option<ThreadId>,
}

/// A FIFO mutual-exclusion lock over user threads.
pub struct Mutex {
    inner: RefCell<Option<Inner>>,
}

// Safety: this library runs on a single OS thread; `RefCell` only needs to
// guard against reentrant borrows within that one thread, not real
// concurrent access.
unsafe impl Sync for Mutex {}

impl Mutex {
    pub const fn uninit() -> Self {
        Self { inner: RefCell::new(None) }
    }

    pub fn new() -> Self {
        Self { inner: RefCell::new(Some(Inner { waiters: Fifo::new(), holder: None })) }
    }

    pub fn init(&self) {
        *self.inner.borrow_mut() = Some(Inner { waiters: Fifo::new(), holder: None });
    }

    /// Block until this thread is both the front of the wait queue and the
    /// mutex is free, spinning via cooperative yields rather than blocking
    /// the scheduler.
    pub fn lock(&self) -> Result<()> {
        if self.inner.borrow().is_none() {
            return Err(Error::InvalidMutex);
        }
        let caller = scheduler::current_id();
        {
            let mut guard = self.inner.borrow_mut();
            let inner = guard.as_mut().ok_or(Error::InvalidMutex)?;
            inner.waiters.enqueue(caller);
        }

        loop {
            let ready = {
                let guard = self.inner.borrow();
                let inner = guard.as_ref().ok_or(Error::InvalidMutex)?;
                inner.holder.is_none() && inner.waiters.front() == Some(&caller)
            };
            if ready {
                break;
            }
            scheduler::yield_now();
        }

        let mut guard = self.inner.borrow_mut();
        let inner = guard.as_mut().ok_or(Error::InvalidMutex)?;
        inner.holder = Some(caller);
        Ok(())
    }

    /// Release the lock. Only the current holder may call this; it pops
    /// itself off the front of the wait queue, letting the next waiter's
    /// spin in `lock` observe the mutex as free.
    pub fn unlock(&self) -> Result<()> {
        if self.inner.borrow().is_none() {
            return Err(Error::InvalidMutex);
        }
        let caller = scheduler::current_id();
        let mut guard = self.inner.borrow_mut();
        let inner = guard.as_mut().ok_or(Error::InvalidMutex)?;
        if inner.holder != Some(caller) {
            return Err(Error::NotHolder);
        }
        inner.waiters.pop();
        inner.holder = None;
        Ok(())
    }

    /// Tear down the mutex. Any thread still blocked in `lock` will keep
    /// spinning; `InvalidMutex` is not reported to it directly. Destroying a
    /// mutex with waiters is a caller error.
    pub fn destroy(&self) -> Result<()> {
        let mut guard = self.inner.borrow_mut();
        if guard.is_none() {
            return Err(Error::InvalidMutex);
        }
        *guard = None;
        Ok(())
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::Mutex;
    use crate::error::Error;

    #[test]
    fn double_destroy_reports_invalid() {
        let m = Mutex::new();
        assert!(m.destroy().is_ok());
        assert_eq!(m.destroy(), Err(Error::InvalidMutex));
    }

    #[test]
    fn uninitialized_lock_reports_invalid() {
        let m = Mutex::uninit();
        assert_eq!(m.lock(), Err(Error::InvalidMutex));
    }
}
